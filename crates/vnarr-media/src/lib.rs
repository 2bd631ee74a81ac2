#![deny(unreachable_patterns)]
//! FFmpeg adapters, motion detection and interval selection.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - FFprobe media information
//! - Grayscale frame decoding behind a [`FrameSource`] trait
//! - Static segment detection with selectable similarity metrics
//! - Grid-search parameter optimization over a frame source
//! - Keep/cut interval resolution, extraction and concatenation
//! - Narration audio assembly and the final mux

pub mod audio;
pub mod command;
pub mod error;
pub mod frames;
pub mod intervals;
pub mod motion;
pub mod mux;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{FfmpegFrames, FrameProvider, FrameSource, InMemoryFrames};
pub use intervals::{
    complement, extract_and_concat, filter_short, resolve, select, Selection,
};
pub use motion::{
    detect_static_segments, load_motion_config, save_motion_config, DetectionRun,
    MotionDetector, OptimizeOutcome, ParameterOptimizer, StaticRunTracker,
    DEFAULT_CONFIG_FILE,
};
pub use mux::MuxJob;
pub use probe::{probe_duration, probe_video, VideoInfo};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_SCANNED_TOTAL: &str = "vnarr_frames_scanned_total";
    pub const STATIC_SEGMENTS_TOTAL: &str = "vnarr_static_segments_total";
    pub const OPTIMIZER_CANDIDATES_TOTAL: &str = "vnarr_optimizer_candidates_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "vnarr_ffmpeg_duration_seconds";
    pub const INTERVALS_EXTRACTED_TOTAL: &str = "vnarr_intervals_extracted_total";
}
