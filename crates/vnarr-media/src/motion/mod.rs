//! Static segment detection and parameter tuning.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ FrameSource  │───►│ Comparator   │───►│ RunTracker   │──► [StaticSegment]
//! │ (gray, fps)  │    │ (metric)     │    │ (no_run/open)│
//! └──────────────┘    └──────────────┘    └──────────────┘
//!        ▲
//!        │ re-opened per candidate
//! ┌──────────────┐
//! │ Optimizer    │──► first MotionConfig whose resulting duration fits
//! └──────────────┘
//! ```

mod detector;
mod metric;
mod optimizer;
mod persist;

use std::path::Path;

use tokio::sync::watch;
use tracing::info;
use vnarr_models::MotionConfig;

pub use detector::{DetectionRun, MotionDetector, StaticRunTracker};
pub use metric::{histogram_correlation, mean_abs_diff, normalized_mse, FrameComparator};
pub use optimizer::{OptimizeOutcome, ParameterOptimizer};
pub use persist::{load_motion_config, save_motion_config, DEFAULT_CONFIG_FILE};

use crate::error::{MediaError, MediaResult};
use crate::frames::FfmpegFrames;

/// Decode `path` with FFmpeg and detect static segments on a blocking thread.
pub async fn detect_static_segments(
    path: impl AsRef<Path>,
    config: MotionConfig,
    analysis_width: Option<u32>,
    cancel_rx: Option<watch::Receiver<bool>>,
) -> MediaResult<DetectionRun> {
    let frames = FfmpegFrames::probe(path.as_ref(), analysis_width).await?;
    let mut detector = MotionDetector::new(config);
    if let Some(rx) = cancel_rx {
        detector = detector.with_cancel(rx);
    }

    let run = tokio::task::spawn_blocking(move || detector.detect_from(&frames))
        .await
        .map_err(|e| MediaError::internal(format!("detection task failed: {}", e)))??;

    let summary = run.summary();
    info!(
        path = %path.as_ref().display(),
        segments = summary.total_segments,
        static_time = summary.total_static_time,
        resulting_duration = summary.resulting_duration,
        "Static segment detection complete"
    );
    Ok(run)
}
