//! Session configuration: languages, segmentation timing, platform credentials.

use crate::defaults;
use crate::error::{ParloError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub languages: LanguageConfig,
    pub segmentation: SegmentationConfig,
    pub platform: PlatformConfig,
}

/// Source and target language selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    /// Language code recognized from the microphone (e.g., "en-US").
    pub source: String,
    /// Language code for translation and synthesized playback (e.g., "es-ES").
    pub target: String,
}

/// Forced-segmentation timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Timer period for forced segment boundaries during playback (ms).
    pub interval_ms: u64,
    /// Capture new speech while a previous translation is still playing.
    pub capture_while_speaking: bool,
}

/// Credentials for the external speech platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlatformConfig {
    /// API key for the speech platform. Required to start a session.
    pub api_key: Option<String>,
    /// Platform region identifier.
    pub region: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: defaults::DEFAULT_SOURCE_LANGUAGE.to_string(),
            target: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::SEGMENT_INTERVAL_MS,
            capture_while_speaking: defaults::CAPTURE_WHILE_SPEAKING,
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: defaults::DEFAULT_REGION.to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is logged
    /// and also falls back to defaults so a broken file never blocks startup.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false);
                if !missing {
                    warn!("ignoring invalid config at {}: {e}", path.display());
                }
                Self::default()
            }
        }
    }

    /// Validates the fields a session start depends on.
    ///
    /// Missing platform credentials and malformed values are hard errors;
    /// a segmentation interval outside the recommended display-pacing range
    /// is accepted with a warning.
    pub fn validate(&self) -> Result<()> {
        if self.languages.source.trim().is_empty() {
            return Err(ParloError::ConfigInvalidValue {
                key: "languages.source".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.languages.target.trim().is_empty() {
            return Err(ParloError::ConfigInvalidValue {
                key: "languages.target".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.segmentation.interval_ms == 0 {
            return Err(ParloError::ConfigInvalidValue {
                key: "segmentation.interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.segmentation.interval_ms < defaults::MIN_SEGMENT_INTERVAL_MS
            || self.segmentation.interval_ms > defaults::MAX_SEGMENT_INTERVAL_MS
        {
            warn!(
                "segmentation interval {}ms is outside the recommended {}..={}ms range",
                self.segmentation.interval_ms,
                defaults::MIN_SEGMENT_INTERVAL_MS,
                defaults::MAX_SEGMENT_INTERVAL_MS
            );
        }
        match &self.platform.api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(ParloError::ConfigMissing {
                    key: "platform.api_key".to_string(),
                });
            }
        }
        if self.platform.region.trim().is_empty() {
            return Err(ParloError::ConfigMissing {
                key: "platform.region".to_string(),
            });
        }
        Ok(())
    }

    /// The forced-segmentation timer period as a [`Duration`].
    pub fn segment_interval(&self) -> Duration {
        Duration::from_millis(self.segmentation.interval_ms)
    }
}
