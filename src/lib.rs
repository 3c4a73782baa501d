//! parlo - Live speech-to-speech interpreter pipeline.
//!
//! Captures continuous speech, translates it, synthesizes the translation,
//! and plays it back while still listening. The heart of the crate is the
//! segment pipeline: segments are played strictly in capture order, one at a
//! time, no matter in which order their synthesis completes, and new speech
//! keeps being captured while a previous translation is playing.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod enhance;
pub mod error;
pub mod output;
pub mod platform;
pub mod scheduler;
pub mod segment;
pub mod segmenter;
pub mod session;

// Collaborator traits (platform -> pipeline -> audio sink)
pub use enhance::{MockEnhancer, NoopEnhancer, TranslationEnhancer};
pub use output::{AudioBuffer, AudioOutput, MockAudioOutput, NullAudioOutput};
pub use platform::{MockSpeechPlatform, RecognitionEvent, RecognitionHandle, SpeechPlatform};

// Pipeline
pub use bus::{EventBus, EventKind, HandlerId, SessionEvent};
pub use scheduler::{PlaybackOutcome, PlaybackScheduler};
pub use segment::{Segment, SegmentStatus, SegmentStore};
pub use segmenter::{PeriodicSegmenter, SegmentationPolicy};
pub use session::SessionController;

// Error handling
pub use error::{ParloError, Result};

// Config
pub use config::SessionConfig;

// Clock injection
pub use clock::{Clock, MockClock, SystemClock};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.2+abc1234"` when git hash is available, `"0.1.2"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
