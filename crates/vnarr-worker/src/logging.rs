//! Render-task log events.

use std::path::Path;
use std::time::Instant;

use tracing::{error, info, warn, Span};
use vnarr_models::JobId;

/// Pipeline stages reported by [`RenderLog::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Probe,
    Optimize,
    Detect,
    Trim,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Probe => "probe",
            RenderStage::Optimize => "optimize",
            RenderStage::Detect => "detect",
            RenderStage::Trim => "trim",
        }
    }
}

/// Events for one render task. Each carries `task_id` and the milliseconds
/// since the log was opened.
#[derive(Debug, Clone)]
pub struct RenderLog {
    task_id: String,
    opened: Instant,
}

impl RenderLog {
    pub fn open(task_id: &JobId) -> Self {
        Self {
            task_id: task_id.to_string(),
            opened: Instant::now(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.opened.elapsed().as_millis() as u64
    }

    /// Span wrapping the whole task so ffmpeg and TTS events inherit `task_id`.
    pub fn span(&self) -> Span {
        tracing::info_span!("render_task", task_id = %self.task_id)
    }

    pub fn started(&self, video: &str) {
        info!(task_id = %self.task_id, video, "Render started");
    }

    pub fn stage(&self, stage: RenderStage, detail: &str) {
        info!(
            task_id = %self.task_id,
            stage = stage.as_str(),
            elapsed_ms = self.elapsed_ms(),
            "{}", detail
        );
    }

    /// Something the caller should know about that does not stop the render.
    pub fn notice(&self, detail: &str) {
        warn!(task_id = %self.task_id, "{}", detail);
    }

    pub fn cancelled(&self) {
        warn!(task_id = %self.task_id, elapsed_ms = self.elapsed_ms(), "Render cancelled");
    }

    pub fn failed(&self, kind: &str, message: &str) {
        error!(
            task_id = %self.task_id,
            kind,
            elapsed_ms = self.elapsed_ms(),
            "Render failed: {}", message
        );
    }

    pub fn finished(&self, output: &Path) {
        info!(
            task_id = %self.task_id,
            output = %output.display(),
            elapsed_ms = self.elapsed_ms(),
            "Render finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_carries_task_id() {
        let id = JobId::new();
        let log = RenderLog::open(&id);
        assert_eq!(log.task_id(), id.to_string());
        assert!(log.elapsed_ms() < 60_000);
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<_> = [
            RenderStage::Probe,
            RenderStage::Optimize,
            RenderStage::Detect,
            RenderStage::Trim,
        ]
        .iter()
        .map(RenderStage::as_str)
        .collect();
        assert_eq!(names, vec!["probe", "optimize", "detect", "trim"]);
    }
}
