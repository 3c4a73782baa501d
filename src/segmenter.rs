//! Periodic forced segmentation: capturing new speech during playback.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Decides whether a timer tick should force a segment boundary.
///
/// A boundary is armed only while capture-while-speaking is enabled and
/// playback is active; the next finalized recognition result consumes it.
/// This replaces handler interception with a checkpoint flag read inside the
/// single recognized-event handler.
#[derive(Debug, Default)]
pub struct SegmentationPolicy {
    capture_while_speaking: bool,
    boundary_pending: bool,
    forced_boundaries: u64,
}

impl SegmentationPolicy {
    /// Creates a policy with the given capture-while-speaking setting.
    pub fn new(capture_while_speaking: bool) -> Self {
        Self {
            capture_while_speaking,
            boundary_pending: false,
            forced_boundaries: 0,
        }
    }

    /// Toggles capture-while-speaking. Disabling clears any pending boundary.
    pub fn set_capture_while_speaking(&mut self, enabled: bool) {
        self.capture_while_speaking = enabled;
        if !enabled {
            self.boundary_pending = false;
        }
    }

    /// Current capture-while-speaking setting.
    pub fn capture_while_speaking(&self) -> bool {
        self.capture_while_speaking
    }

    /// Timer tick checkpoint. Arms a boundary request only when
    /// capture-while-speaking is enabled and audio is playing.
    /// Returns true when a boundary was armed by this tick.
    pub fn on_tick(&mut self, playing: bool) -> bool {
        if self.capture_while_speaking && playing {
            self.boundary_pending = true;
            true
        } else {
            false
        }
    }

    /// Consumes a pending boundary request. Called once per finalized result.
    pub fn take_boundary(&mut self) -> bool {
        let pending = self.boundary_pending;
        self.boundary_pending = false;
        if pending {
            self.forced_boundaries += 1;
        }
        pending
    }

    /// Number of boundaries forced so far in this session.
    pub fn forced_boundaries(&self) -> u64 {
        self.forced_boundaries
    }
}

/// Timer that nudges the pipeline into fresh segment boundaries while audio
/// is playing, so long utterances spoken over playback keep segmenting.
pub struct PeriodicSegmenter {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicSegmenter {
    /// Creates a stopped segmenter with the given tick period.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
        }
    }

    /// True while the timer task is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Starts the timer; one message is sent on `ticks` per period.
    /// Starting an already running segmenter is a no-op.
    pub fn start(&mut self, ticks: mpsc::Sender<()>) {
        if self.handle.is_some() {
            return;
        }
        let period = self.interval;
        debug!(?period, "starting forced-segmentation timer");
        self.handle = Some(tokio::spawn(async move {
            let mut cadence = interval(period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately.
            cadence.tick().await;
            loop {
                cadence.tick().await;
                if ticks.send(()).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Stops the timer. The task is guaranteed inert once this returns:
    /// no tick fires after this point.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicSegmenter {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
