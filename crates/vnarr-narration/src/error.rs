//! Error types for narration processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for narration operations.
pub type NarrationResult<T> = Result<T, NarrationError>;

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("Speech synthesis failed for chunk {index}: {message}")]
    SynthesisFailed { index: usize, message: String },

    #[error("Synthesizer returned an invalid duration ({duration}) for chunk {index}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("Audio file not found: {0}")]
    AudioNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NarrationError {
    /// Create a synthesis failure error.
    pub fn synthesis_failed(index: usize, message: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            index,
            message: message.into(),
        }
    }
}
