//! Motion detection configuration and results.
//!
//! The defaults match footage recorded at normal frame rates:
//! a frame pair is static when its mean absolute luma difference is
//! below `0.1`, and only runs of two seconds or longer are reported.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, RawInterval};

/// How two consecutive sampled frames are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Mean absolute pixel difference (0-255). Static when below threshold.
    #[default]
    PixelDifference,
    /// Correlation of 256-bin luma histograms (-1..1). Static when above threshold.
    HistogramCorrelation,
    /// `1 - mse / 255²` (0..1). Static when above threshold.
    NormalizedMse,
}

impl SimilarityMetric {
    /// Whether a score means "this frame is visually unchanged".
    pub fn is_static(&self, score: f64, threshold: f64) -> bool {
        match self {
            SimilarityMetric::PixelDifference => score < threshold,
            SimilarityMetric::HistogramCorrelation | SimilarityMetric::NormalizedMse => {
                score > threshold
            }
        }
    }

    /// Threshold that separates static from moving frames on this metric's scale.
    pub fn default_threshold(&self) -> f64 {
        match self {
            SimilarityMetric::PixelDifference => 0.1,
            SimilarityMetric::HistogramCorrelation | SimilarityMetric::NormalizedMse => 0.98,
        }
    }

    /// Similarity metrics compare downsampled frames by default.
    pub fn default_compare_size(&self) -> Option<u32> {
        match self {
            SimilarityMetric::PixelDifference => None,
            _ => Some(32),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::PixelDifference => "pixel_difference",
            SimilarityMetric::HistogramCorrelation => "histogram_correlation",
            SimilarityMetric::NormalizedMse => "normalized_mse",
        }
    }
}

/// Parameters for one motion detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionConfig {
    /// Static/moving decision threshold, interpreted by `metric`.
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,
    /// Shortest static run (seconds) that is reported.
    #[serde(default = "default_min_static_duration")]
    pub min_static_duration: f64,
    /// Only every `sample_step`-th frame is examined.
    #[serde(default = "default_sample_step")]
    pub sample_step: u32,
    #[serde(default)]
    pub metric: SimilarityMetric,
    /// Square size frames are resized to before comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_size: Option<u32>,
}

fn default_motion_threshold() -> f64 {
    0.1
}

fn default_min_static_duration() -> f64 {
    2.0
}

fn default_sample_step() -> u32 {
    1
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            motion_threshold: default_motion_threshold(),
            min_static_duration: default_min_static_duration(),
            sample_step: default_sample_step(),
            metric: SimilarityMetric::PixelDifference,
            compare_size: None,
        }
    }
}

impl MotionConfig {
    pub fn new(motion_threshold: f64, min_static_duration: f64, sample_step: u32) -> Self {
        Self::default()
            .with_threshold(motion_threshold)
            .with_min_static_duration(min_static_duration)
            .with_sample_step(sample_step)
    }

    /// Duplicate-frame preset: histogram correlation on 32x32 thumbnails.
    pub fn duplicate_frames() -> Self {
        Self::default()
            .with_metric(SimilarityMetric::HistogramCorrelation)
            .with_min_static_duration(0.5)
    }

    /// Builder-style setter for the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.motion_threshold = threshold;
        self
    }

    /// Builder-style setter for the minimum static duration.
    pub fn with_min_static_duration(mut self, secs: f64) -> Self {
        self.min_static_duration = secs.max(0.0);
        self
    }

    /// Builder-style setter for the sample step (at least 1).
    pub fn with_sample_step(mut self, step: u32) -> Self {
        self.sample_step = step.max(1);
        self
    }

    /// Builder-style setter for the metric.
    ///
    /// Thresholds are not comparable across metrics, so switching metric also
    /// resets the threshold and compare size to the new metric's defaults.
    /// Call [`with_threshold`](Self::with_threshold) afterwards to override.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        if metric != self.metric {
            self.motion_threshold = metric.default_threshold();
        }
        self.metric = metric;
        self.compare_size = metric.default_compare_size();
        self
    }

    pub fn with_compare_size(mut self, size: Option<u32>) -> Self {
        self.compare_size = size.filter(|s| *s > 0);
        self
    }
}

/// Candidate values searched by the parameter optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParamGrid {
    pub motion_thresholds: Vec<f64>,
    pub min_static_durations: Vec<f64>,
    pub sample_steps: Vec<u32>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self::for_metric(SimilarityMetric::PixelDifference)
    }
}

impl ParamGrid {
    /// Default grid on `metric`'s threshold scale.
    ///
    /// Thresholds run from the least to the most aggressive trim: rising
    /// pixel differences, falling similarities.
    pub fn for_metric(metric: SimilarityMetric) -> Self {
        let motion_thresholds = match metric {
            SimilarityMetric::PixelDifference => (1..=10).map(|i| i as f64 * 0.05).collect(),
            SimilarityMetric::HistogramCorrelation | SimilarityMetric::NormalizedMse => {
                vec![0.995, 0.99, 0.985, 0.98, 0.97, 0.96, 0.95, 0.94, 0.92, 0.90]
            }
        };
        Self {
            motion_thresholds,
            min_static_durations: vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0],
            sample_steps: vec![1, 2, 3],
        }
    }

    /// Number of configurations in the grid.
    pub fn len(&self) -> usize {
        self.motion_thresholds.len() * self.min_static_durations.len() * self.sample_steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All configurations in search order: threshold outermost, step innermost.
    pub fn candidates(&self, base: &MotionConfig) -> Vec<MotionConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &threshold in &self.motion_thresholds {
            for &min_static in &self.min_static_durations {
                for &step in &self.sample_steps {
                    out.push(
                        base.clone()
                            .with_threshold(threshold)
                            .with_min_static_duration(min_static)
                            .with_sample_step(step),
                    );
                }
            }
        }
        out
    }
}

/// An interval judged visually static by the motion detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StaticSegment {
    #[serde(flatten)]
    pub interval: Interval,
}

impl StaticSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            interval: Interval::new(start, end),
        }
    }

    pub fn start(&self) -> f64 {
        self.interval.start
    }

    pub fn end(&self) -> f64 {
        self.interval.end
    }

    pub fn duration(&self) -> f64 {
        self.interval.duration()
    }

    /// Export in the interval selector's input format (timestamp strings).
    pub fn to_raw_interval(&self) -> RawInterval {
        RawInterval::timestamps(self.start(), self.end())
    }
}

/// Aggregate figures for one detection run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StaticSummary {
    pub total_segments: usize,
    pub total_static_time: f64,
    pub average_segment_duration: f64,
    /// Source duration minus static time.
    pub resulting_duration: f64,
}

impl StaticSummary {
    pub fn from_segments(segments: &[StaticSegment], total_duration: f64) -> Self {
        let total_static_time: f64 = segments.iter().map(StaticSegment::duration).sum();
        let average_segment_duration = if segments.is_empty() {
            0.0
        } else {
            total_static_time / segments.len() as f64
        };
        Self {
            total_segments: segments.len(),
            total_static_time,
            average_segment_duration,
            resulting_duration: total_duration - total_static_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MotionConfig::default();
        assert!((config.motion_threshold - 0.1).abs() < f64::EPSILON);
        assert!((config.min_static_duration - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.sample_step, 1);
        assert_eq!(config.metric, SimilarityMetric::PixelDifference);
    }

    #[test]
    fn test_persisted_shape_loads_with_defaults() {
        let config: MotionConfig =
            serde_json::from_str(r#"{"motion_threshold":0.25,"sample_step":3}"#).unwrap();
        assert!((config.motion_threshold - 0.25).abs() < f64::EPSILON);
        assert!((config.min_static_duration - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.sample_step, 3);
    }

    #[test]
    fn test_sample_step_never_zero() {
        assert_eq!(MotionConfig::default().with_sample_step(0).sample_step, 1);
    }

    #[test]
    fn test_metric_direction() {
        assert!(SimilarityMetric::PixelDifference.is_static(0.05, 0.1));
        assert!(!SimilarityMetric::PixelDifference.is_static(0.1, 0.1));
        assert!(SimilarityMetric::HistogramCorrelation.is_static(0.99, 0.98));
        assert!(!SimilarityMetric::NormalizedMse.is_static(0.98, 0.98));
    }

    #[test]
    fn test_default_grid_order() {
        let grid = ParamGrid::default();
        assert_eq!(grid.len(), 180);

        let candidates = grid.candidates(&MotionConfig::default());
        assert_eq!(candidates.len(), 180);
        assert!((candidates[0].motion_threshold - 0.05).abs() < 1e-9);
        assert_eq!(candidates[0].sample_step, 1);
        assert_eq!(candidates[1].sample_step, 2);
        assert!((candidates[3].min_static_duration - 1.0).abs() < 1e-9);
        assert!((candidates[179].motion_threshold - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_with_metric_uses_metric_threshold() {
        for metric in [
            SimilarityMetric::HistogramCorrelation,
            SimilarityMetric::NormalizedMse,
        ] {
            let config = MotionConfig::new(0.1, 2.0, 1).with_metric(metric);
            assert!((config.motion_threshold - 0.98).abs() < f64::EPSILON);
            assert_eq!(config.compare_size, Some(32));
        }

        let back = MotionConfig::default()
            .with_metric(SimilarityMetric::NormalizedMse)
            .with_metric(SimilarityMetric::PixelDifference);
        assert!((back.motion_threshold - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_same_metric_keeps_threshold() {
        let config = MotionConfig::new(0.3, 2.0, 1).with_metric(SimilarityMetric::PixelDifference);
        assert!((config.motion_threshold - 0.3).abs() < f64::EPSILON);

        let tuned = MotionConfig::default()
            .with_metric(SimilarityMetric::HistogramCorrelation)
            .with_threshold(0.95);
        assert!((tuned.motion_threshold - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duplicate_preset() {
        let config = MotionConfig::duplicate_frames();
        assert_eq!(config.metric, SimilarityMetric::HistogramCorrelation);
        assert!((config.motion_threshold - 0.98).abs() < f64::EPSILON);
        assert!((config.min_static_duration - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_grid_stays_on_similarity_scale() {
        for metric in [
            SimilarityMetric::HistogramCorrelation,
            SimilarityMetric::NormalizedMse,
        ] {
            let grid = ParamGrid::for_metric(metric);
            assert_eq!(grid.len(), 180);
            assert!(grid
                .motion_thresholds
                .iter()
                .all(|t| (0.9..=0.995).contains(t)));
            assert!(grid.motion_thresholds.windows(2).all(|w| w[0] > w[1]));
        }
        assert_eq!(
            ParamGrid::for_metric(SimilarityMetric::PixelDifference),
            ParamGrid::default()
        );
    }

    #[test]
    fn test_static_segment_export() {
        let raw = StaticSegment::new(2.0, 4.5).to_raw_interval();
        assert_eq!(raw.resolve(10.0).unwrap(), Interval::new(2.0, 4.5));
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["start"], "00:00:02.000");
    }

    #[test]
    fn test_summary() {
        let segments = [StaticSegment::new(0.0, 2.0), StaticSegment::new(5.0, 9.0)];
        let summary = StaticSummary::from_segments(&segments, 20.0);
        assert_eq!(summary.total_segments, 2);
        assert!((summary.total_static_time - 6.0).abs() < 1e-9);
        assert!((summary.average_segment_duration - 3.0).abs() < 1e-9);
        assert!((summary.resulting_duration - 14.0).abs() < 1e-9);
    }
}
