//! Render plan written next to each output.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vnarr_models::{Interval, StaticSegment, SubtitleWindow};

use crate::error::WorkerResult;

/// Everything the render stage consumed, for inspection and re-rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Source intervals kept, in output order.
    pub keep_intervals: Vec<Interval>,
    /// Subtitle windows on the output timeline.
    pub windows: Vec<SubtitleWindow>,
    pub narration_duration: f64,
    pub video_duration: f64,
    /// Windows timed from estimates rather than measured audio.
    pub approximated: usize,
    /// Keep intervals that overlapped an earlier one.
    #[serde(default)]
    pub overlaps: usize,
    /// Static footage removed by auto-trim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_segments: Vec<StaticSegment>,
}

impl RenderPlan {
    /// Narration longer than the trimmed video gets cut at the end.
    pub fn narration_overruns(&self) -> bool {
        self.narration_duration > self.video_duration
    }

    /// `<output stem>.plan.json` beside `output`.
    pub fn path_for(output: &Path) -> PathBuf {
        output.with_extension("plan.json")
    }

    pub async fn write(&self, path: &Path) -> WorkerResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn read(path: &Path) -> WorkerResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
