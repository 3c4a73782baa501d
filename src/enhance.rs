//! Optional best-effort enhancement of machine translations.

use crate::error::{ParloError, Result};
use async_trait::async_trait;
use tracing::debug;

/// Text-quality enhancement step between translation and synthesis.
///
/// Implementations are best-effort collaborators: the pipeline never lets a
/// failure here surface, it falls back to the machine translation instead.
#[async_trait]
pub trait TranslationEnhancer: Send + Sync {
    /// Returns an improved rendering of `machine_translation`.
    async fn improve(
        &self,
        original: &str,
        machine_translation: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;
}

/// Enhancer that returns the machine translation unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnhancer;

#[async_trait]
impl TranslationEnhancer for NoopEnhancer {
    async fn improve(
        &self,
        _original: &str,
        machine_translation: &str,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<String> {
        Ok(machine_translation.to_string())
    }
}

/// Mock enhancer for testing.
#[derive(Debug, Clone)]
pub struct MockEnhancer {
    suffix: String,
    should_fail: bool,
}

impl MockEnhancer {
    /// Creates a mock that appends a marker suffix to every translation.
    pub fn new() -> Self {
        Self {
            suffix: "(enhanced)".to_string(),
            should_fail: false,
        }
    }

    /// Sets the suffix appended to improved translations.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    /// Makes every improve call fail.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationEnhancer for MockEnhancer {
    async fn improve(
        &self,
        _original: &str,
        machine_translation: &str,
        _source_language: &str,
        _target_language: &str,
    ) -> Result<String> {
        if self.should_fail {
            return Err(ParloError::Enhancement {
                message: "mock enhancement failure".to_string(),
            });
        }
        Ok(format!("{machine_translation} {}", self.suffix))
    }
}

/// Applies `enhancer` best-effort.
///
/// Any failure falls back to the unmodified machine translation; the error is
/// logged at debug level and never reaches the caller.
pub async fn improve_or_fallback(
    enhancer: &dyn TranslationEnhancer,
    original: &str,
    machine_translation: &str,
    source_language: &str,
    target_language: &str,
) -> String {
    match enhancer
        .improve(original, machine_translation, source_language, target_language)
        .await
    {
        Ok(improved) => improved,
        Err(e) => {
            debug!("enhancement failed, keeping machine translation: {e}");
            machine_translation.to_string()
        }
    }
}
