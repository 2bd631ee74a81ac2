//! Time intervals and keep/cut modes.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::timestamp::{format_seconds, parse_timestamp};

/// Intervals shorter than this are treated as noise and dropped.
pub const MIN_INTERVAL_SECS: f64 = 0.05;

/// A `[start, end)` range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Strict overlap; touching intervals do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}]", self.start, self.end)
    }
}

/// A bound given either as seconds or as a timestamp string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Timestamp(String),
}

impl TimeValue {
    pub fn to_seconds(&self) -> ModelResult<f64> {
        match self {
            TimeValue::Seconds(s) if s.is_finite() && *s >= 0.0 => Ok(*s),
            TimeValue::Seconds(s) => Err(ModelError::invalid_interval(format!(
                "bound must be a non-negative number, got {}",
                s
            ))),
            TimeValue::Timestamp(ts) => Ok(parse_timestamp(ts)?),
        }
    }
}

/// Caller-supplied interval; missing bounds default to the video edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeValue>,
}

impl RawInterval {
    pub fn seconds(start: f64, end: f64) -> Self {
        Self {
            start: Some(TimeValue::Seconds(start)),
            end: Some(TimeValue::Seconds(end)),
        }
    }

    /// Timestamp-string form, as produced by the motion detector export.
    pub fn timestamps(start: f64, end: f64) -> Self {
        Self {
            start: Some(TimeValue::Timestamp(format_seconds(start))),
            end: Some(TimeValue::Timestamp(format_seconds(end))),
        }
    }

    /// Resolve missing bounds against `[0, total_duration]`.
    pub fn resolve(&self, total_duration: f64) -> ModelResult<Interval> {
        let start = match &self.start {
            Some(v) => v.to_seconds()?,
            None => 0.0,
        };
        let end = match &self.end {
            Some(v) => v.to_seconds()?,
            None => total_duration,
        };
        Ok(Interval::new(start, end))
    }
}

/// Whether listed intervals are footage to retain or to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SegmentsMode {
    #[default]
    Keep,
    Cut,
}

impl SegmentsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentsMode::Keep => "keep",
            SegmentsMode::Cut => "cut",
        }
    }
}

impl FromStr for SegmentsMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(SegmentsMode::Keep),
            "cut" => Ok(SegmentsMode::Cut),
            other => Err(ModelError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for SegmentsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_interval_defaults_to_video_edges() {
        let raw = RawInterval::default();
        assert_eq!(raw.resolve(40.0).unwrap(), Interval::new(0.0, 40.0));

        let raw = RawInterval {
            start: Some(TimeValue::Timestamp("00:00:05".into())),
            end: None,
        };
        assert_eq!(raw.resolve(40.0).unwrap(), Interval::new(5.0, 40.0));
    }

    #[test]
    fn test_raw_interval_accepts_numbers_and_strings() {
        let raw: RawInterval =
            serde_json::from_str(r#"{"start":"00:00:05","end":15.5}"#).unwrap();
        assert_eq!(raw.resolve(40.0).unwrap(), Interval::new(5.0, 15.5));
    }

    #[test]
    fn test_raw_interval_rejects_bad_timestamp() {
        let raw = RawInterval {
            start: Some(TimeValue::Timestamp("five".into())),
            end: None,
        };
        assert!(matches!(raw.resolve(10.0), Err(ModelError::Timestamp(_))));

        let raw = RawInterval::seconds(-1.0, 3.0);
        assert!(matches!(raw.resolve(10.0), Err(ModelError::InvalidInterval(_))));
    }

    #[test]
    fn test_segments_mode_parsing() {
        assert_eq!("keep".parse::<SegmentsMode>().unwrap(), SegmentsMode::Keep);
        assert_eq!(" CUT ".parse::<SegmentsMode>().unwrap(), SegmentsMode::Cut);
        assert!(matches!(
            "trim".parse::<SegmentsMode>(),
            Err(ModelError::UnsupportedMode(_))
        ));
        assert!(serde_json::from_str::<SegmentsMode>("\"trim\"").is_err());
    }

    #[test]
    fn test_overlap_excludes_touching() {
        let a = Interval::new(0.0, 5.0);
        assert!(a.overlaps(&Interval::new(4.0, 6.0)));
        assert!(!a.overlaps(&Interval::new(5.0, 6.0)));
    }
}
