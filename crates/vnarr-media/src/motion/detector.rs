//! Static segment detection over a frame stream.
//!
//! # State Machine
//!
//! ```text
//!                 frame is static
//!     ┌──────────────────────────────────────┐
//!     │                                      ▼
//! ┌────────┐                          ┌───────────────┐
//! │ NoRun  │◄─────────────────────────│ RunOpen{start}│
//! └────────┘   frame moved: emit if   └───────────────┘
//!              t - start >= min_static_duration
//! ```
//!
//! A run still open at end of stream is measured against the stream's
//! duration (`frames / fps`) and emitted under the same rule.

use image::GrayImage;
use metrics::counter;
use tokio::sync::watch;
use tracing::debug;
use vnarr_models::{MotionConfig, StaticSegment, StaticSummary};

use super::metric::FrameComparator;
use crate::error::{MediaError, MediaResult};
use crate::frames::{FrameProvider, FrameSource};
use crate::names;

enum RunState {
    NoRun,
    RunOpen { start: f64 },
}

/// Turns per-frame static/moving decisions into static segments.
pub struct StaticRunTracker {
    min_static_duration: f64,
    state: RunState,
    segments: Vec<StaticSegment>,
}

impl StaticRunTracker {
    pub fn new(min_static_duration: f64) -> Self {
        Self {
            min_static_duration,
            state: RunState::NoRun,
            segments: Vec::new(),
        }
    }

    /// Feed one sampled frame's decision at timestamp `t` (seconds).
    pub fn observe(&mut self, is_static: bool, t: f64) {
        match (&self.state, is_static) {
            (RunState::NoRun, true) => {
                self.state = RunState::RunOpen { start: t };
            }
            (RunState::RunOpen { start }, false) => {
                let start = *start;
                self.close(start, t);
                self.state = RunState::NoRun;
            }
            _ => {}
        }
    }

    fn close(&mut self, start: f64, end: f64) {
        if end - start >= self.min_static_duration {
            debug!(start, end, "Static run closed");
            self.segments.push(StaticSegment::new(start, end));
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, RunState::RunOpen { .. })
    }

    /// End the stream at `end` and return every emitted segment.
    pub fn finish(mut self, end: f64) -> Vec<StaticSegment> {
        if let RunState::RunOpen { start } = self.state {
            self.close(start, end);
        }
        self.segments
    }
}

/// Result of scanning one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRun {
    pub segments: Vec<StaticSegment>,
    /// Stream duration implied by decoded frames.
    pub total_duration: f64,
    pub frames_read: u64,
    pub frames_sampled: u64,
}

impl DetectionRun {
    pub fn static_time(&self) -> f64 {
        self.segments.iter().map(StaticSegment::duration).sum()
    }

    /// Duration left after removing every static segment.
    pub fn resulting_duration(&self) -> f64 {
        self.total_duration - self.static_time()
    }

    pub fn summary(&self) -> StaticSummary {
        StaticSummary::from_segments(&self.segments, self.total_duration)
    }
}

/// Motion segment detector with a pluggable similarity metric.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    config: MotionConfig,
    comparator: FrameComparator,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        let comparator = FrameComparator::from_config(&config);
        Self {
            config,
            comparator,
            cancel_rx: None,
        }
    }

    /// Abort between frames when the channel flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    fn check_cancelled(&self) -> MediaResult<()> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => Err(MediaError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Open `provider` and scan it from the start.
    pub fn detect_from(&self, provider: &dyn FrameProvider) -> MediaResult<DetectionRun> {
        let mut source = provider.open()?;
        self.detect(source.as_mut())
    }

    /// Scan `source` to the end.
    ///
    /// Every frame is decoded and counted toward the stream duration, but only
    /// every `sample_step`-th frame is compared against the previous sampled
    /// frame. Timestamps are `frame_index / fps`.
    pub fn detect(&self, source: &mut dyn FrameSource) -> MediaResult<DetectionRun> {
        let fps = source.fps();
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MediaError::InvalidVideo(format!("invalid frame rate {}", fps)));
        }

        let step = u64::from(self.config.sample_step.max(1));
        let mut tracker = StaticRunTracker::new(self.config.min_static_duration);
        let mut prev: Option<GrayImage> = None;
        let mut frames_read: u64 = 0;
        let mut frames_sampled: u64 = 0;

        loop {
            self.check_cancelled()?;
            let Some(frame) = source.next_frame()? else {
                break;
            };
            let index = frames_read;
            frames_read += 1;
            if index % step != 0 {
                continue;
            }
            frames_sampled += 1;

            let frame = self.comparator.prepare(frame);
            if let Some(prev_frame) = &prev {
                let t = index as f64 / fps;
                let is_static =
                    self.comparator
                        .is_static(prev_frame, &frame, self.config.motion_threshold)?;
                tracker.observe(is_static, t);
            }
            prev = Some(frame);
        }

        if frames_read == 0 {
            return Err(MediaError::NoFrames("stream ended before the first frame".to_string()));
        }

        let total_duration = frames_read as f64 / fps;
        let segments = tracker.finish(total_duration);

        counter!(names::FRAMES_SCANNED_TOTAL).increment(frames_read);
        counter!(names::STATIC_SEGMENTS_TOTAL).increment(segments.len() as u64);
        debug!(
            frames_read,
            frames_sampled,
            segments = segments.len(),
            threshold = self.config.motion_threshold,
            min_static = self.config.min_static_duration,
            step,
            "Motion scan complete"
        );

        Ok(DetectionRun {
            segments,
            total_duration,
            frames_read,
            frames_sampled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::InMemoryFrames;
    use image::Luma;
    use vnarr_models::SimilarityMetric;

    /// One frame per entry; equal values are identical frames.
    fn frames(values: &[u8], fps: f64) -> InMemoryFrames {
        InMemoryFrames::new(
            values
                .iter()
                .map(|&v| GrayImage::from_pixel(4, 4, Luma([v])))
                .collect(),
            fps,
        )
    }

    #[test]
    fn test_tracker_drops_short_runs() {
        let mut tracker = StaticRunTracker::new(0.5);
        tracker.observe(true, 2.0);
        tracker.observe(true, 2.1);
        tracker.observe(false, 2.3);
        assert!(!tracker.is_open());
        assert!(tracker.finish(10.0).is_empty());
    }

    #[test]
    fn test_tracker_emits_long_runs() {
        let mut tracker = StaticRunTracker::new(0.5);
        tracker.observe(true, 1.0);
        tracker.observe(false, 2.0);
        tracker.observe(false, 3.0);
        assert_eq!(tracker.finish(10.0), vec![StaticSegment::new(1.0, 2.0)]);
    }

    #[test]
    fn test_tracker_trailing_run_uses_stream_end() {
        let mut tracker = StaticRunTracker::new(2.0);
        tracker.observe(true, 7.0);
        assert!(tracker.is_open());
        assert_eq!(tracker.finish(9.5), vec![StaticSegment::new(7.0, 9.5)]);

        let mut tracker = StaticRunTracker::new(2.0);
        tracker.observe(true, 8.0);
        assert!(tracker.finish(9.5).is_empty());
    }

    #[test]
    fn test_detect_static_middle() {
        // 1 fps: motion, then frames 2..=5 identical, then motion.
        let source = frames(&[0, 50, 100, 100, 100, 100, 200, 10], 1.0);
        let detector = MotionDetector::new(MotionConfig::new(0.1, 2.0, 1));
        let run = detector.detect_from(&source).unwrap();

        // Run opens at t=3 (first unchanged frame) and closes at t=6.
        assert_eq!(run.segments, vec![StaticSegment::new(3.0, 6.0)]);
        assert_eq!(run.frames_read, 8);
        assert!((run.total_duration - 8.0).abs() < 1e-9);
        assert!((run.resulting_duration() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_detect_trailing_static() {
        let source = frames(&[0, 9, 9, 9, 9, 9], 2.0);
        let detector = MotionDetector::new(MotionConfig::new(0.1, 1.0, 1));
        let run = detector.detect_from(&source).unwrap();
        assert_eq!(run.segments, vec![StaticSegment::new(1.0, 3.0)]);
        let summary = run.summary();
        assert_eq!(summary.total_segments, 1);
        assert!((summary.total_static_time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_step_skips_frames() {
        // Odd frames differ but are never sampled with step 2.
        let source = frames(&[5, 250, 5, 250, 5, 250, 5, 250], 1.0);
        let detector = MotionDetector::new(MotionConfig::new(0.1, 1.0, 2));
        let run = detector.detect_from(&source).unwrap();
        assert_eq!(run.frames_sampled, 4);
        assert_eq!(run.segments, vec![StaticSegment::new(2.0, 8.0)]);

        let every_frame = MotionDetector::new(MotionConfig::new(0.1, 1.0, 1));
        assert!(every_frame.detect_from(&source).unwrap().segments.is_empty());
    }

    #[test]
    fn test_histogram_metric_uses_same_state_machine() {
        let source = frames(&[0, 80, 80, 80, 80, 160], 1.0);
        let config = MotionConfig::duplicate_frames().with_min_static_duration(1.0);
        assert_eq!(config.metric, SimilarityMetric::HistogramCorrelation);
        let run = MotionDetector::new(config).detect_from(&source).unwrap();
        assert_eq!(run.segments, vec![StaticSegment::new(2.0, 5.0)]);
    }

    #[test]
    fn test_switching_metric_keeps_moving_frames_moving() {
        let moving = frames(&[0, 50, 100, 150, 200, 250, 0, 50], 1.0);
        let held = frames(&[0, 120, 120, 120, 120, 120, 120, 240], 1.0);

        for metric in [
            SimilarityMetric::PixelDifference,
            SimilarityMetric::HistogramCorrelation,
            SimilarityMetric::NormalizedMse,
        ] {
            let config = MotionConfig::new(0.1, 2.0, 1).with_metric(metric);

            let run = MotionDetector::new(config.clone()).detect_from(&moving).unwrap();
            assert!(
                run.segments.is_empty(),
                "{:?} cut moving frames: {:?}",
                metric,
                run.segments
            );
            assert!((run.resulting_duration() - 8.0).abs() < 1e-9);

            let run = MotionDetector::new(config).detect_from(&held).unwrap();
            assert_eq!(run.segments, vec![StaticSegment::new(2.0, 7.0)], "{:?}", metric);
        }
    }

    #[test]
    fn test_empty_stream_is_resource_error() {
        let source = frames(&[], 25.0);
        let result = MotionDetector::new(MotionConfig::default()).detect_from(&source);
        assert!(matches!(result, Err(MediaError::NoFrames(_))));
    }

    #[test]
    fn test_invalid_fps() {
        let source = frames(&[1, 1], 0.0);
        let result = MotionDetector::new(MotionConfig::default()).detect_from(&source);
        assert!(matches!(result, Err(MediaError::InvalidVideo(_))));
    }

    #[test]
    fn test_cancellation_discards_run() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let source = frames(&[1, 1, 1], 1.0);
        let detector = MotionDetector::new(MotionConfig::default()).with_cancel(rx);
        assert!(matches!(detector.detect_from(&source), Err(MediaError::Cancelled)));
    }
}
