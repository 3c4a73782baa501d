//! Audio output boundary: decoding and playing synthesized audio.

use crate::error::{ParloError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Decoded audio ready for the output device.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Raw samples as delivered by the decoder.
    pub data: Vec<u8>,
}

/// Output device for synthesized audio.
///
/// Only the playback scheduler writes to this device; it is the single shared
/// audio resource of a session.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Decodes synthesized bytes into a playable buffer.
    async fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer>;

    /// Plays a decoded buffer. Resolves when output finishes.
    async fn play(&self, buffer: AudioBuffer) -> Result<()>;
}

/// Audio output that consumes buffers without a device, pacing playback by
/// payload size. Useful for demos and headless environments.
#[derive(Debug, Clone, Copy)]
pub struct NullAudioOutput {
    bytes_per_ms: usize,
}

impl NullAudioOutput {
    /// Creates a null output with the default pacing rate.
    pub fn new() -> Self {
        Self { bytes_per_ms: 64 }
    }

    /// Sets how many payload bytes count as one millisecond of playback.
    pub fn with_rate(mut self, bytes_per_ms: usize) -> Self {
        self.bytes_per_ms = bytes_per_ms.max(1);
        self
    }
}

impl Default for NullAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for NullAudioOutput {
    async fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        Ok(AudioBuffer {
            data: bytes.to_vec(),
        })
    }

    async fn play(&self, buffer: AudioBuffer) -> Result<()> {
        let millis = (buffer.data.len() / self.bytes_per_ms).max(1) as u64;
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }
}

struct MockOutputInner {
    played: Vec<Vec<u8>>,
    decode_failures: Vec<String>,
    play_failures: Vec<String>,
}

/// Mock audio output for testing.
///
/// Records every played payload in dispatch order and can fail decode or
/// playback for payloads containing a given text.
pub struct MockAudioOutput {
    inner: Mutex<MockOutputInner>,
    play_duration: Duration,
}

impl MockAudioOutput {
    /// Creates a mock with a short fixed playback duration.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockOutputInner {
                played: Vec::new(),
                decode_failures: Vec::new(),
                play_failures: Vec::new(),
            }),
            play_duration: Duration::from_millis(5),
        }
    }

    /// Sets how long each play call takes.
    pub fn with_play_duration(mut self, duration: Duration) -> Self {
        self.play_duration = duration;
        self
    }

    /// Makes decode fail for payloads containing `text`.
    pub fn with_decode_failure_for(self, text: &str) -> Self {
        self.lock().decode_failures.push(text.to_string());
        self
    }

    /// Makes playback fail for payloads containing `text`.
    pub fn with_play_failure_for(self, text: &str) -> Self {
        self.lock().play_failures.push(text.to_string());
        self
    }

    /// Payloads handed to `play`, in dispatch order.
    pub fn played(&self) -> Vec<Vec<u8>> {
        self.lock().played.clone()
    }

    /// Played payloads rendered as text for easy assertions.
    pub fn played_texts(&self) -> Vec<String> {
        self.lock()
            .played
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    /// Number of play calls observed.
    pub fn play_count(&self) -> usize {
        self.lock().played.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockOutputInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for MockAudioOutput {
    async fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        let text = String::from_utf8_lossy(bytes).into_owned();
        if self.lock().decode_failures.iter().any(|f| text.contains(f)) {
            return Err(ParloError::Decode {
                message: format!("mock decode failure for '{text}'"),
            });
        }
        Ok(AudioBuffer {
            data: bytes.to_vec(),
        })
    }

    async fn play(&self, buffer: AudioBuffer) -> Result<()> {
        let text = String::from_utf8_lossy(&buffer.data).into_owned();
        let fail = {
            let mut inner = self.lock();
            inner.played.push(buffer.data.clone());
            inner.play_failures.iter().any(|f| text.contains(f))
        };
        tokio::time::sleep(self.play_duration).await;
        if fail {
            return Err(ParloError::Playback {
                message: format!("mock playback failure for '{text}'"),
            });
        }
        Ok(())
    }
}

/// Implement AudioOutput for Arc<T> to allow sharing across sessions.
#[async_trait]
impl<T: AudioOutput> AudioOutput for Arc<T> {
    async fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        (**self).decode(bytes).await
    }

    async fn play(&self, buffer: AudioBuffer) -> Result<()> {
        (**self).play(buffer).await
    }
}
