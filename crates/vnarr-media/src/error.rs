//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;
use vnarr_models::ModelError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("No decodable frames in {0}")]
    NoFrames(String),

    #[error("Frame decode failed: {0}")]
    FrameDecode(String),

    #[error("Malformed interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Nothing to keep: all {requested} interval(s) were empty or shorter than the minimum")]
    NothingToKeep { requested: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ModelError> for MediaError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnsupportedMode(mode) => {
                Self::InvalidConfig(format!("unsupported segments mode '{}'", mode))
            }
            other => Self::InvalidInterval(other.to_string()),
        }
    }
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_interval(message: impl Into<String>) -> Self {
        Self::InvalidInterval(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn frame_decode(message: impl Into<String>) -> Self {
        Self::FrameDecode(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Caller input was unusable; retrying the same request will not help.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MediaError::InvalidInterval(_) | MediaError::InvalidConfig(_)
        )
    }

    /// The source media is missing or unreadable.
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            MediaError::FileNotFound(_)
                | MediaError::InvalidVideo(_)
                | MediaError::NoFrames(_)
                | MediaError::FrameDecode(_)
        )
    }
}
