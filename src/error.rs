//! Error types for the audio engine
//!
//! Codec, allocation and device failures are reported through [`AudioError`].
//! A queue underrun is not an error: the output path covers it with silence.

use thiserror::Error;

/// Main error type for the audio engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The stream's codec could not be found or opened
    #[error("Unsupported audio codec: {0}")]
    UnsupportedCodec(String),

    /// Resampler or staging buffer could not be allocated; the session cannot continue
    #[error("Allocation failure: {0}")]
    Allocation(String),

    /// A single packet failed to decode
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Device(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using the engine error
pub type Result<T> = std::result::Result<T, AudioError>;
