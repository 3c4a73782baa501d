//! Playback scheduling: chronological order, single-flight audio output.

use crate::defaults;
use crate::error::Result;
use crate::output::AudioOutput;
use crate::segment::SegmentStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Outcome of one playback attempt, reported back to the session loop.
#[derive(Debug)]
pub struct PlaybackOutcome {
    /// Segment whose audio was dispatched.
    pub id: u64,
    /// Ok when the audio played to completion.
    pub result: Result<()>,
}

/// Serializes audio output and guarantees chronological playback order
/// despite out-of-order synthesis completion.
///
/// Dispatch is gated on the chronological head of the in-flight set: the
/// earliest non-terminal segment must itself be ready before anything plays.
/// A later segment whose synthesis finished first waits until every earlier
/// segment has either played or failed. Dispatch attempts are triggered by
/// state-change messages, never by polling.
pub struct PlaybackScheduler {
    audio: Arc<dyn AudioOutput>,
    outcomes: mpsc::Sender<PlaybackOutcome>,
    currently_playing: Option<u64>,
    cooldown: Duration,
}

impl PlaybackScheduler {
    /// Creates a scheduler writing to `audio` and reporting on `outcomes`.
    pub fn new(audio: Arc<dyn AudioOutput>, outcomes: mpsc::Sender<PlaybackOutcome>) -> Self {
        Self {
            audio,
            outcomes,
            currently_playing: None,
            cooldown: Duration::from_millis(defaults::DISPATCH_COOLDOWN_MS),
        }
    }

    /// Overrides the settle pause before each device access.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Id of the segment currently driving the output device, if any.
    pub fn currently_playing(&self) -> Option<u64> {
        self.currently_playing
    }

    /// True while a segment is undergoing output. This is the playback mutex:
    /// at most one segment drives the device at any instant.
    pub fn is_playing(&self) -> bool {
        self.currently_playing.is_some()
    }

    /// Attempts to dispatch the chronological head of `store`.
    ///
    /// Returns the dispatched id, or None when output is busy, nothing is in
    /// flight, or the head segment's audio is not ready yet.
    pub fn try_dispatch(&mut self, store: &SegmentStore) -> Option<u64> {
        if self.currently_playing.is_some() {
            return None;
        }
        let head = store.next_for_playback()?;
        if !head.is_ready() {
            debug!(id = head.id, status = ?head.status, "playback head not ready, waiting");
            return None;
        }
        let id = head.id;
        let bytes = head.audio.clone()?;
        self.currently_playing = Some(id);

        let audio = self.audio.clone();
        let outcomes = self.outcomes.clone();
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            if !cooldown.is_zero() {
                tokio::time::sleep(cooldown).await;
            }
            let result = async {
                let buffer = audio.decode(&bytes).await?;
                audio.play(buffer).await
            }
            .await;
            let _ = outcomes.send(PlaybackOutcome { id, result }).await;
        });
        Some(id)
    }

    /// Releases the output mutex after the completion for `id` is handled.
    pub fn finish(&mut self, id: u64) {
        if self.currently_playing == Some(id) {
            self.currently_playing = None;
        }
    }
}
