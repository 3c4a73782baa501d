//! Default configuration constants for parlo.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default source language code for recognition.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "en-US";

/// Default target language code for translation and synthesis.
pub const DEFAULT_TARGET_LANGUAGE: &str = "es-ES";

/// Default speech platform region.
pub const DEFAULT_REGION: &str = "us-east";

/// Default forced-segmentation timer period in milliseconds.
///
/// Controls how often a fresh segment boundary is attempted while translated
/// audio is playing, so long utterances spoken over playback keep splitting
/// into displayable segments. This is distinct from the platform's own
/// segmentation silence threshold, which is a much larger value.
pub const SEGMENT_INTERVAL_MS: u64 = 250;

/// Lower bound of the recommended segmentation interval range.
pub const MIN_SEGMENT_INTERVAL_MS: u64 = 50;

/// Upper bound of the recommended segmentation interval range.
pub const MAX_SEGMENT_INTERVAL_MS: u64 = 1000;

/// Whether new speech is captured while a previous translation is playing.
pub const CAPTURE_WHILE_SPEAKING: bool = true;

/// Pause before each playback dispatch in milliseconds.
///
/// Gives the output device a moment to settle between consecutive segments.
/// Kept in the low single digits so it never perceptibly delays playback.
pub const DISPATCH_COOLDOWN_MS: u64 = 2;

/// Buffer size for the recognition event channel.
pub const RECOGNITION_BUFFER: usize = 32;

/// Buffer size for the synthesis and playback outcome channels.
pub const PIPELINE_BUFFER: usize = 64;

/// Buffer size for the controller command channel.
pub const COMMAND_BUFFER: usize = 8;

/// Buffer size for the segmentation timer tick channel.
pub const TICK_BUFFER: usize = 4;
