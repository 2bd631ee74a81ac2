//! Shared data models for the narration timeline engine.
//!
//! This crate provides Serde-serializable value objects for:
//! - Narration units and subtitle windows
//! - Keep/cut intervals and timestamp parsing
//! - Motion detection configuration and parameter grids
//! - Typed narration requests and task states

pub mod error;
pub mod interval;
pub mod job;
pub mod motion;
pub mod request;
pub mod text;
pub mod timestamp;
pub mod voice;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use interval::{Interval, RawInterval, SegmentsMode, TimeValue, MIN_INTERVAL_SECS};
pub use job::{JobId, JobState};
pub use motion::{MotionConfig, ParamGrid, SimilarityMetric, StaticSegment, StaticSummary};
pub use request::{AutoTrimConfig, NarrationRequest, SplitConfig, SplitStrategy};
pub use text::{DurationSource, SubtitleWindow, TextUnit};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
pub use voice::{Voice, DEFAULT_VOICE, VOICES};
