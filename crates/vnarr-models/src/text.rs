//! Narration units and subtitle windows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a unit's `duration` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    /// No duration known yet (`duration == 0`).
    #[default]
    Unknown,
    /// Length-proportional share of a parent duration.
    Estimated,
    /// Measured from synthesized audio.
    Measured,
}

/// A piece of narration text, or a pure silence placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextUnit {
    /// Text to speak and display; empty for silence.
    #[serde(default)]
    pub text: String,
    /// Duration in seconds (0 when unknown).
    #[serde(default)]
    pub duration: f64,
    /// Extra silence in milliseconds.
    #[serde(default, alias = "delay")]
    pub delay_ms: u64,
    #[serde(default)]
    pub duration_source: DurationSource,
}

impl TextUnit {
    /// Narration unit with unknown duration.
    pub fn narration(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration: 0.0,
            delay_ms: 0,
            duration_source: DurationSource::Unknown,
        }
    }

    /// Pure silence of `delay_ms` milliseconds.
    pub fn silence(delay_ms: u64) -> Self {
        Self {
            text: String::new(),
            duration: 0.0,
            delay_ms,
            duration_source: DurationSource::Unknown,
        }
    }

    /// Builder-style setter for a known duration.
    pub fn with_duration(mut self, duration: f64, source: DurationSource) -> Self {
        self.duration = duration.max(0.0);
        self.duration_source = source;
        self
    }

    /// Whether this unit carries no text.
    pub fn is_silence(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Silence that actually occupies time.
    pub fn is_timed_silence(&self) -> bool {
        self.is_silence() && (self.delay_ms > 0 || self.duration > 0.0)
    }

    /// Seconds this unit advances the timeline clock.
    pub fn span_secs(&self) -> f64 {
        if self.is_silence() {
            self.duration + self.delay_ms as f64 / 1000.0
        } else {
            self.duration
        }
    }

    /// Character count used for length limits and proportional shares.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A subtitle display window on the narrated timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleWindow {
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

impl SubtitleWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_classification() {
        assert!(TextUnit::silence(1500).is_timed_silence());
        assert!(!TextUnit::silence(0).is_timed_silence());
        assert!(!TextUnit::narration("hi").is_silence());
        assert!(TextUnit::narration("   ").is_silence());
    }

    #[test]
    fn test_span_counts_delay_only_for_silence() {
        let silence = TextUnit::silence(1500).with_duration(0.5, DurationSource::Measured);
        assert!((silence.span_secs() - 2.0).abs() < 1e-9);

        let mut spoken = TextUnit::narration("hi").with_duration(1.2, DurationSource::Measured);
        spoken.delay_ms = 400;
        assert!((spoken.span_secs() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_accepts_legacy_delay_key() {
        let unit: TextUnit = serde_json::from_str(r#"{"text":"","delay":2000}"#).unwrap();
        assert_eq!(unit.delay_ms, 2000);
        assert_eq!(unit.duration_source, DurationSource::Unknown);
    }

    #[test]
    fn test_char_len_counts_cjk_as_single_chars() {
        assert_eq!(TextUnit::narration("你好world").char_len(), 7);
    }
}
