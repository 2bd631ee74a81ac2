//! Error types for model parsing and validation.

use thiserror::Error;

use crate::timestamp::TimestampError;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Configuration errors raised while interpreting caller input.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unsupported segments mode '{0}', expected 'keep' or 'cut'")]
    UnsupportedMode(String),

    #[error("Malformed interval: {0}")]
    InvalidInterval(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a malformed interval error.
    pub fn invalid_interval(message: impl Into<String>) -> Self {
        Self::InvalidInterval(message.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
