//! Temporal text segmentation.
//!
//! Turns raw narration units into speakable, displayable chunks:
//! inline pause markers become silence units, long text is split with a
//! [`BoundaryPolicy`], and a known parent duration is optionally shared
//! across the pieces by character count.
//!
//! Shared durations are estimates. Speech rate is not linear in character
//! count, so the timeline is built from measured audio whenever possible.

use metrics::counter;
use tracing::{debug, warn};
use vnarr_models::{DurationSource, SplitConfig, TextUnit};

use crate::boundary::BoundaryPolicy;
use crate::markers::{parse_markers, MarkerSpan};
use crate::names;

/// Whether durations are estimated during segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationMode {
    /// Share a known parent duration by piece length.
    #[default]
    Proportional,
    /// Leave durations at zero; they are measured later.
    Deferred,
}

/// Segmentation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    pub max_chars: usize,
    pub min_chars: usize,
    pub policy: BoundaryPolicy,
    pub duration_mode: DurationMode,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: 20,
            min_chars: 5,
            policy: BoundaryPolicy::Windowed,
            duration_mode: DurationMode::Proportional,
        }
    }
}

impl SegmenterConfig {
    pub fn from_split(split: &SplitConfig) -> Self {
        Self {
            max_chars: split.max_chars,
            min_chars: split.min_chars,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_duration_mode(mut self, mode: DurationMode) -> Self {
        self.duration_mode = mode;
        self
    }

    /// Builder-style setter for the length bounds; `min` is capped at `max`.
    pub fn with_bounds(mut self, max_chars: usize, min_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self.min_chars = min_chars.min(self.max_chars);
        self
    }
}

/// Split `units` with the default windowed policy.
pub fn segment(units: &[TextUnit], max_chars: usize, min_chars: usize) -> Vec<TextUnit> {
    Segmenter::new(SegmenterConfig::default().with_bounds(max_chars, min_chars)).segment(units)
}

/// Text segmenter.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

enum Piece {
    Text(String),
    Silence(u64),
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment every unit, preserving source order of text and silence.
    pub fn segment(&self, units: &[TextUnit]) -> Vec<TextUnit> {
        let mut out = Vec::with_capacity(units.len());
        for unit in units {
            self.segment_unit(unit, &mut out);
        }

        counter!(names::UNITS_SEGMENTED_TOTAL).increment(out.len() as u64);
        debug!(
            units_in = units.len(),
            units_out = out.len(),
            max_chars = self.config.max_chars,
            min_chars = self.config.min_chars,
            policy = ?self.config.policy,
            "Segmented narration"
        );
        out
    }

    /// Expand markers only, without length splitting.
    pub fn expand_markers(&self, units: &[TextUnit]) -> Vec<TextUnit> {
        let unbounded = Segmenter::new(SegmenterConfig {
            max_chars: usize::MAX,
            min_chars: 0,
            ..self.config.clone()
        });
        unbounded.segment(units)
    }

    fn segment_unit(&self, unit: &TextUnit, out: &mut Vec<TextUnit>) {
        if unit.is_silence() {
            if unit.is_timed_silence() {
                out.push(TextUnit {
                    text: String::new(),
                    ..unit.clone()
                });
            }
            return;
        }

        let pieces = self.split_pieces(&unit.text);
        let text_lens: Vec<usize> = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Text(t) => Some(t.chars().count()),
                Piece::Silence(_) => None,
            })
            .collect();

        let unchanged = pieces.len() == 1 && text_lens.len() == 1;
        let total_chars: usize = text_lens.iter().sum();
        let estimate = self.config.duration_mode == DurationMode::Proportional
            && unit.duration > 0.0
            && !unchanged
            && total_chars > 0;

        if estimate {
            counter!(names::DURATION_ESTIMATES_TOTAL).increment(text_lens.len() as u64);
            warn!(
                parent_duration = unit.duration,
                pieces = text_lens.len(),
                "Sharing duration by character count; timing is approximate"
            );
        }

        for piece in pieces {
            match piece {
                Piece::Silence(delay_ms) => out.push(TextUnit::silence(delay_ms)),
                Piece::Text(text) if unchanged => out.push(TextUnit {
                    text,
                    delay_ms: 0,
                    ..unit.clone()
                }),
                Piece::Text(text) if estimate => {
                    let share = text.chars().count() as f64 / total_chars as f64;
                    out.push(
                        TextUnit::narration(text)
                            .with_duration(unit.duration * share, DurationSource::Estimated),
                    );
                }
                Piece::Text(text) => out.push(TextUnit::narration(text)),
            }
        }

        // A pause attached to a narration unit follows its speech.
        if unit.delay_ms > 0 {
            out.push(TextUnit::silence(unit.delay_ms));
        }
    }

    fn split_pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for span in parse_markers(text) {
            match span {
                MarkerSpan::Silence(0) => {}
                MarkerSpan::Silence(ms) => pieces.push(Piece::Silence(ms)),
                MarkerSpan::Text(t) => {
                    let chars: Vec<char> = t.trim().chars().collect();
                    if chars.is_empty() {
                        continue;
                    }
                    pieces.extend(
                        self.config
                            .policy
                            .split(&chars, self.config.max_chars, self.config.min_chars)
                            .into_iter()
                            .map(Piece::Text),
                    );
                }
            }
        }
        pieces
    }
}
