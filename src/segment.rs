//! Segment lifecycle: one utterance tracked from recognition through playback.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Lifecycle status of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Audio is being captured for this segment.
    Recording,
    /// The platform reported a finalized recognition+translation result.
    Recognizing,
    /// A synthesis request is in flight for the translated text.
    Synthesizing,
    /// Synthesized audio is ready for, or undergoing, playback.
    Playing,
    /// Playback finished without error.
    Completed,
    /// The segment failed. Terminal: never retried or resurrected.
    Error,
}

impl SegmentStatus {
    /// Position along the forward lifecycle, used to refuse backward moves.
    fn rank(self) -> u8 {
        match self {
            SegmentStatus::Recording => 0,
            SegmentStatus::Recognizing => 1,
            SegmentStatus::Synthesizing => 2,
            SegmentStatus::Playing => 3,
            SegmentStatus::Completed => 4,
            SegmentStatus::Error => 5,
        }
    }

    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, SegmentStatus::Completed | SegmentStatus::Error)
    }
}

/// One utterance's end-to-end translation unit.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    /// Unique within a session, strictly increasing in creation order.
    pub id: u64,
    /// Capture time relative to session start, assigned once at creation.
    /// The sole ordering key for playback.
    pub timestamp: Duration,
    /// Current lifecycle status.
    pub status: SegmentStatus,
    /// Recognized text in the source language.
    pub original_text: Option<String>,
    /// Translated text in the target language.
    pub translated_text: Option<String>,
    /// Synthesized audio bytes, populated when synthesis finishes.
    #[serde(skip_serializing)]
    pub audio: Option<Vec<u8>>,
}

impl Segment {
    /// Creates a segment for a finalized recognition result.
    pub fn new(id: u64, timestamp: Duration) -> Self {
        Self {
            id,
            timestamp,
            status: SegmentStatus::Recognizing,
            original_text: None,
            translated_text: None,
            audio: None,
        }
    }

    /// Attempts a status transition.
    ///
    /// Transitions are monotonic forward; terminal states are never left.
    /// Returns false when the move was refused.
    pub fn transition(&mut self, next: SegmentStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if next != SegmentStatus::Error && next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }

    /// True when audio is ready and the segment is eligible for dispatch.
    pub fn is_ready(&self) -> bool {
        self.status == SegmentStatus::Playing && self.audio.is_some()
    }
}

/// In-flight segments for the active session, indexed by id.
///
/// Ids increase in creation order, so iteration order is also capture order
/// for segments created by the same session.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: BTreeMap<u64, Segment>,
}

impl SegmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a segment, replacing any previous entry with the same id.
    pub fn insert(&mut self, segment: Segment) {
        self.segments.insert(segment.id, segment);
    }

    /// Looks up a segment by id.
    pub fn get(&self, id: u64) -> Option<&Segment> {
        self.segments.get(&id)
    }

    /// Looks up a segment by id for mutation.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Segment> {
        self.segments.get_mut(&id)
    }

    /// Removes a segment from the active set.
    pub fn remove(&mut self, id: u64) -> Option<Segment> {
        self.segments.remove(&id)
    }

    /// Number of in-flight segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when no segments are in flight.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Drops all segments.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// The chronological head of the in-flight set: the earliest non-terminal
    /// segment by capture timestamp, ids breaking ties.
    ///
    /// Playback order is a function of capture time, never of synthesis
    /// completion order, so only this segment may be dispatched next.
    pub fn next_for_playback(&self) -> Option<&Segment> {
        self.segments
            .values()
            .filter(|segment| !segment.status.is_terminal())
            .min_by_key(|segment| (segment.timestamp, segment.id))
    }

    /// Iterates segments in id (creation) order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }
}
