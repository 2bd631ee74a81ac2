//! Narration render worker.
//!
//! This crate provides:
//! - The end-to-end render pipeline (trim, narrate, subtitle, mux)
//! - An in-process task store with single-writer state transitions
//! - An `edge-tts` backed speech synthesizer
//! - Structured render-task logging and environment configuration

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod store;
pub mod tts;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{RenderLog, RenderStage};
pub use pipeline::{merge_cuts, narration_units, subtitle_units, NarrationPipeline, RenderOutput};
pub use plan::RenderPlan;
pub use store::{TaskRecord, TaskStore, TaskWriter};
pub use tts::EdgeTtsSynthesizer;
