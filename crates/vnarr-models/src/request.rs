//! Typed narration request.
//!
//! A request is parsed and validated once at the boundary. Downstream
//! stages receive the typed value and never re-check it.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{ModelError, ModelResult};
use crate::interval::{RawInterval, SegmentsMode};
use crate::motion::SimilarityMetric;
use crate::voice::{Voice, VOICES};

/// How narration text is chunked before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Length-bounded, boundary-respecting split.
    #[default]
    Smart,
    /// Group already-timed units up to a target duration.
    Duration,
    /// Keep input units as they are (markers are still expanded).
    None,
}

/// Text chunking options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_split_bounds"))]
pub struct SplitConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub strategy: SplitStrategy,
    #[serde(default = "default_max_chars", alias = "max_chars")]
    #[validate(range(min = 1, max = 500))]
    pub max_chars: usize,
    #[serde(default = "default_min_chars", alias = "min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_target_duration", alias = "target_duration")]
    #[validate(range(exclusive_min = 0.0))]
    pub target_duration: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    20
}

fn default_min_chars() -> usize {
    5
}

fn default_target_duration() -> f64 {
    3.0
}

fn validate_split_bounds(config: &SplitConfig) -> Result<(), ValidationError> {
    if config.min_chars > config.max_chars {
        return Err(ValidationError::new("min_chars_exceeds_max_chars"));
    }
    Ok(())
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            enable: true,
            strategy: SplitStrategy::Smart,
            max_chars: default_max_chars(),
            min_chars: default_min_chars(),
            target_duration: default_target_duration(),
        }
    }
}

impl SplitConfig {
    /// Strategy actually applied, taking `enable` into account.
    pub fn effective_strategy(&self) -> SplitStrategy {
        if self.enable {
            self.strategy
        } else {
            SplitStrategy::None
        }
    }
}

/// Automatic static-footage trimming.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_target_range"))]
pub struct AutoTrimConfig {
    /// Persisted parameters to start from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    /// When both bounds are set, search for parameters hitting this range first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_min_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_max_duration: Option<f64>,
    #[serde(default)]
    pub metric: SimilarityMetric,
}

fn validate_target_range(config: &AutoTrimConfig) -> Result<(), ValidationError> {
    match (config.target_min_duration, config.target_max_duration) {
        (Some(min), Some(max)) if min < 0.0 || min > max => {
            Err(ValidationError::new("invalid_target_range"))
        }
        (Some(_), None) | (None, Some(_)) => Err(ValidationError::new("incomplete_target_range")),
        _ => Ok(()),
    }
}

impl AutoTrimConfig {
    pub fn target_range(&self) -> Option<(f64, f64)> {
        self.target_min_duration.zip(self.target_max_duration)
    }
}

/// A request to narrate and trim one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_request"))]
pub struct NarrationRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(length(min = 1))]
    pub video_path: String,
    #[serde(default)]
    #[validate(range(max = 4))]
    pub voice_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(default)]
    pub segments_mode: SegmentsMode,
    /// Accepts a JSON array or the string form of that array.
    #[serde(default, deserialize_with = "deserialize_segments")]
    pub segments: Vec<RawInterval>,
    #[serde(default, alias = "auto_split_config")]
    #[validate(nested)]
    pub split: SplitConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub auto_trim: Option<AutoTrimConfig>,
}

fn validate_request(request: &NarrationRequest) -> Result<(), ValidationError> {
    if request.auto_trim.is_some()
        && request.segments_mode == SegmentsMode::Keep
        && !request.segments.is_empty()
    {
        return Err(ValidationError::new("auto_trim_requires_cut_mode"));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentsInput {
    List(Vec<RawInterval>),
    Encoded(String),
}

fn deserialize_segments<'de, D>(deserializer: D) -> Result<Vec<RawInterval>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SegmentsInput>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(SegmentsInput::List(list)) => Ok(list),
        Some(SegmentsInput::Encoded(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(SegmentsInput::Encoded(s)) => {
            serde_json::from_str(&s).map_err(serde::de::Error::custom)
        }
    }
}

impl NarrationRequest {
    /// Parse and validate a JSON request body.
    pub fn from_json(body: &str) -> ModelResult<Self> {
        let request: NarrationRequest = serde_json::from_str(body)?;
        request.validated()
    }

    /// Validate a request built in code.
    pub fn validated(self) -> ModelResult<Self> {
        self.validate()
            .map_err(|e| ModelError::invalid_request(e.to_string()))?;
        Ok(self)
    }

    pub fn voice(&self) -> Voice {
        VOICES[self.voice_index.min(VOICES.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    #[test]
    fn test_minimal_request_uses_defaults() {
        let req = NarrationRequest::from_json(r#"{"text":"hello","video_path":"in.mp4"}"#).unwrap();
        assert_eq!(req.voice_index, 0);
        assert_eq!(req.segments_mode, SegmentsMode::Keep);
        assert!(req.segments.is_empty());
        assert_eq!(req.split.max_chars, 20);
        assert_eq!(req.split.effective_strategy(), SplitStrategy::Smart);
    }

    #[test]
    fn test_segments_accept_string_form() {
        let body = r#"{
            "text": "hello",
            "video_path": "in.mp4",
            "segments_mode": "cut",
            "segments": "[{\"start\":\"00:00:05\",\"end\":\"00:00:15\"}]"
        }"#;
        let req = NarrationRequest::from_json(body).unwrap();
        assert_eq!(req.segments.len(), 1);
        assert_eq!(req.segments[0].resolve(40.0).unwrap(), Interval::new(5.0, 15.0));
    }

    #[test]
    fn test_legacy_split_config_keys() {
        let body = r#"{
            "text": "hello",
            "video_path": "in.mp4",
            "auto_split_config": {"enable": true, "strategy": "duration", "maxChars": 12, "targetDuration": 2.5}
        }"#;
        let req = NarrationRequest::from_json(body).unwrap();
        assert_eq!(req.split.strategy, SplitStrategy::Duration);
        assert_eq!(req.split.max_chars, 12);
        assert!((req.split.target_duration - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let body = r#"{"text":"hi","video_path":"in.mp4","segments_mode":"trim"}"#;
        assert!(matches!(NarrationRequest::from_json(body), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let body = r#"{"text":"","video_path":"in.mp4"}"#;
        assert!(matches!(
            NarrationRequest::from_json(body),
            Err(ModelError::InvalidRequest(_))
        ));

        let body = r#"{"text":"hi","video_path":"in.mp4","voice_index":7}"#;
        assert!(NarrationRequest::from_json(body).is_err());

        let body = r#"{"text":"hi","video_path":"in.mp4","split":{"maxChars":4,"minChars":9}}"#;
        assert!(NarrationRequest::from_json(body).is_err());
    }

    #[test]
    fn test_auto_trim_range_validation() {
        let body = r#"{"text":"hi","video_path":"in.mp4","auto_trim":{"target_min_duration":50}}"#;
        assert!(NarrationRequest::from_json(body).is_err());

        let body = r#"{"text":"hi","video_path":"in.mp4","auto_trim":{"target_min_duration":50,"target_max_duration":70}}"#;
        let req = NarrationRequest::from_json(body).unwrap();
        assert_eq!(req.auto_trim.unwrap().target_range(), Some((50.0, 70.0)));
    }
}
