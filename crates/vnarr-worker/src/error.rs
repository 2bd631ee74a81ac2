//! Worker error types.

use thiserror::Error;
use vnarr_media::MediaError;
use vnarr_models::{JobState, ModelError};
use vnarr_narration::NarrationError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Unusable request: bad mode, malformed interval, invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source media missing or unreadable.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Interval selection left nothing to render.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} already has a writer")]
    AlreadyClaimed(String),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobState,
        to: JobState,
    },

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Narration error: {0}")]
    Narration(NarrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        if err.is_configuration() {
            return Self::Configuration(err.to_string());
        }
        if err.is_resource() {
            return Self::Resource(err.to_string());
        }
        match err {
            MediaError::NothingToKeep { .. } => Self::EmptyResult(err.to_string()),
            MediaError::Cancelled => Self::Cancelled,
            MediaError::Timeout(secs) => Self::Timeout(secs),
            other => Self::Media(other),
        }
    }
}

impl From<NarrationError> for WorkerError {
    fn from(err: NarrationError) -> Self {
        match err {
            NarrationError::Cancelled => Self::Cancelled,
            other => Self::Narration(other),
        }
    }
}

impl From<ModelError> for WorkerError {
    fn from(err: ModelError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl WorkerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Short category name for logs and task records.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Configuration(_) => "configuration",
            WorkerError::Resource(_) => "resource",
            WorkerError::EmptyResult(_) => "empty_result",
            WorkerError::Cancelled => "cancelled",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::TaskNotFound(_)
            | WorkerError::AlreadyClaimed(_)
            | WorkerError::InvalidTransition { .. } => "task",
            WorkerError::Media(_) => "media",
            WorkerError::Narration(_) => "narration",
            WorkerError::Io(_) => "io",
            WorkerError::Json(_) => "json",
        }
    }

    /// Check if error is retryable.
    ///
    /// Request, resource and empty-result failures will fail the same way
    /// again; tool and engine failures may not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Timeout(_)
                | WorkerError::Media(_)
                | WorkerError::Io(_)
                | WorkerError::Narration(NarrationError::SynthesisFailed { .. })
        )
    }
}
