//! Speech platform boundary: continuous recognition+translation and synthesis.

use crate::error::{ParloError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Raw lifecycle notification from the platform's continuous recognizer.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// Interim hypothesis; the text may still change.
    Recognizing { text: String },
    /// Finalized recognition with its translation. Recognition and
    /// translation arrive atomically: the platform produces both fields in
    /// one notification, so there is no separate translating stage.
    Recognized { original: String, translated: String },
    /// The platform canceled recognition (network loss, auth failure, ...).
    Canceled { reason: String },
    /// The platform-side recognition session opened.
    SessionStarted,
    /// The platform-side recognition session closed.
    SessionStopped,
}

/// Handle to a running continuous recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionHandle(pub u64);

/// External speech service performing recognition, translation, and synthesis.
///
/// This trait allows swapping implementations (a real cloud client vs mock).
#[async_trait]
pub trait SpeechPlatform: Send + Sync {
    /// Starts continuous recognition+translation.
    ///
    /// Lifecycle notifications are delivered on `events` until the returned
    /// handle is passed to [`SpeechPlatform::stop_recognition`].
    async fn start_recognition(
        &self,
        source_language: &str,
        target_language: &str,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<RecognitionHandle>;

    /// Stops a running continuous recognition.
    async fn stop_recognition(&self, handle: RecognitionHandle) -> Result<()>;

    /// Synthesizes speech for `text` in the given voice language.
    async fn synthesize(&self, text: &str, voice_language: &str) -> Result<Vec<u8>>;
}

struct MockPlatformInner {
    events: Option<mpsc::Sender<RecognitionEvent>>,
    next_handle: u64,
    active: Option<RecognitionHandle>,
    synthesis_delays: VecDeque<Duration>,
    delay_overrides: Vec<(String, Duration)>,
    default_delay: Duration,
    failing_texts: Vec<String>,
    fail_start: bool,
}

/// Mock speech platform for testing and demos.
///
/// Recognition results are injected by the test through
/// [`MockSpeechPlatform::emit`]; synthesis returns `pcm:<text>` bytes after a
/// configurable delay, so out-of-order completion is easy to stage.
pub struct MockSpeechPlatform {
    inner: Mutex<MockPlatformInner>,
}

impl MockSpeechPlatform {
    /// Creates a mock with immediate synthesis and no failures.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockPlatformInner {
                events: None,
                next_handle: 0,
                active: None,
                synthesis_delays: VecDeque::new(),
                delay_overrides: Vec::new(),
                default_delay: Duration::ZERO,
                failing_texts: Vec::new(),
                fail_start: false,
            }),
        }
    }

    /// Sets the delay applied to every synthesis call.
    pub fn with_synthesis_delay(self, delay: Duration) -> Self {
        self.lock().default_delay = delay;
        self
    }

    /// Queues per-call synthesis delays, consumed in call order.
    /// Once exhausted, the default delay applies again.
    pub fn with_synthesis_delays(self, delays: Vec<Duration>) -> Self {
        self.lock().synthesis_delays = delays.into();
        self
    }

    /// Sets the synthesis delay for any text containing `text`.
    ///
    /// Overrides win over queued and default delays, so completion order can
    /// be staged per utterance regardless of request interleaving.
    pub fn with_synthesis_delay_for(self, text: &str, delay: Duration) -> Self {
        self.lock().delay_overrides.push((text.to_string(), delay));
        self
    }

    /// Makes synthesis fail for any text containing `text`.
    pub fn with_synthesis_failure_for(self, text: &str) -> Self {
        self.lock().failing_texts.push(text.to_string());
        self
    }

    /// Makes `start_recognition` fail.
    pub fn with_start_failure(self) -> Self {
        self.lock().fail_start = true;
        self
    }

    /// Injects a recognition event into the active session.
    ///
    /// Returns false when no recognition is running or the session loop has
    /// already gone away.
    pub async fn emit(&self, event: RecognitionEvent) -> bool {
        let sender = self.lock().events.clone();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Convenience wrapper emitting a finalized result.
    pub async fn emit_recognized(&self, original: &str, translated: &str) -> bool {
        self.emit(RecognitionEvent::Recognized {
            original: original.to_string(),
            translated: translated.to_string(),
        })
        .await
    }

    /// True while a recognition session is running.
    pub fn is_recognizing(&self) -> bool {
        self.lock().active.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockPlatformInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockSpeechPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechPlatform for MockSpeechPlatform {
    async fn start_recognition(
        &self,
        _source_language: &str,
        _target_language: &str,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<RecognitionHandle> {
        let mut inner = self.lock();
        if inner.fail_start {
            return Err(ParloError::Recognition {
                message: "mock recognition start failure".to_string(),
            });
        }
        let handle = RecognitionHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.active = Some(handle);
        inner.events = Some(events);
        Ok(handle)
    }

    async fn stop_recognition(&self, handle: RecognitionHandle) -> Result<()> {
        let mut inner = self.lock();
        if inner.active == Some(handle) {
            inner.active = None;
            inner.events = None;
        }
        Ok(())
    }

    async fn synthesize(&self, text: &str, _voice_language: &str) -> Result<Vec<u8>> {
        let (delay, fail) = {
            let mut inner = self.lock();
            let delay = match inner
                .delay_overrides
                .iter()
                .find(|(t, _)| text.contains(t))
            {
                Some((_, delay)) => *delay,
                None => inner
                    .synthesis_delays
                    .pop_front()
                    .unwrap_or(inner.default_delay),
            };
            let fail = inner.failing_texts.iter().any(|f| text.contains(f));
            (delay, fail)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ParloError::Synthesis {
                message: format!("mock synthesis failure for '{text}'"),
            });
        }
        Ok(format!("pcm:{text}").into_bytes())
    }
}
