#![deny(unreachable_patterns)]
//! Narration text segmentation and timeline assembly.
//!
//! This crate provides:
//! - Inline time-marker parsing (`{2s}`, `{1500ms}`)
//! - Length-bounded, boundary-respecting text segmentation
//! - Duration-based grouping of timed units
//! - Timeline assembly from measured durations
//! - SRT serialisation of subtitle windows
//! - Order-preserving speech synthesis over a pluggable engine
//!
//! # Pipeline
//!
//! ```text
//! raw text ──► markers ──► segmenter ──► synthesizer ──► assembler ──► SRT
//!                              │          (measured)        │
//!                              └── estimated durations ─────┘ (fallback, warned)
//! ```

pub mod boundary;
pub mod error;
pub mod grouping;
pub mod markers;
pub mod segmenter;
pub mod srt;
pub mod synth;
pub mod timeline;

pub use boundary::BoundaryPolicy;
pub use error::{NarrationError, NarrationResult};
pub use grouping::group_by_duration;
pub use markers::{parse_markers, MarkerSpan, TimeMarker};
pub use segmenter::{segment, DurationMode, Segmenter, SegmenterConfig};
pub use srt::{format_srt_time, to_srt, write_srt};
pub use synth::{synthesize_units, SpeechSynthesizer, SynthesisOutput, SynthesizedAudio};
pub use timeline::{assemble, assemble_timeline, Timeline};

/// Metric names as constants for consistency.
pub mod names {
    pub const UNITS_SEGMENTED_TOTAL: &str = "vnarr_units_segmented_total";
    pub const DURATION_ESTIMATES_TOTAL: &str = "vnarr_duration_estimates_total";
    pub const TTS_CHUNKS_TOTAL: &str = "vnarr_tts_chunks_total";
    pub const TTS_SECONDS: &str = "vnarr_tts_audio_seconds";
}
