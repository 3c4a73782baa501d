//! Error types for parlo.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParloError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Missing configuration for {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Speech platform errors
    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    #[error("Synthesis failed: {message}")]
    Synthesis { message: String },

    // Audio output errors
    #[error("Audio decode failed: {message}")]
    Decode { message: String },

    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // Enhancement errors (swallowed at the collaborator boundary)
    #[error("Enhancement failed: {message}")]
    Enhancement { message: String },

    // Session lifecycle errors
    #[error("Session error: {message}")]
    Session { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ParloError>;
