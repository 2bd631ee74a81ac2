//! Timeline assembly.
//!
//! Walks timed units in order with a running clock. Narration units emit a
//! subtitle window `[t, t + duration)`; silence advances the clock by
//! `duration + delay_ms / 1000` and emits nothing. Because the clock only
//! moves forward, windows are ordered and never overlap.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vnarr_models::{DurationSource, Interval, SubtitleWindow, TextUnit};

/// The assembled narration timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub windows: Vec<SubtitleWindow>,
    /// Silence spans between (or around) windows.
    pub gaps: Vec<Interval>,
    /// Clock value after the last unit.
    pub total_duration: f64,
    /// Windows whose duration was not measured from audio.
    pub approximated: usize,
}

impl Timeline {
    pub fn is_monotonic(&self) -> bool {
        self.windows.windows(2).all(|w| w[0].end <= w[1].start)
    }
}

/// Subtitle windows for `segments`.
pub fn assemble(segments: &[TextUnit]) -> Vec<SubtitleWindow> {
    assemble_timeline(segments).windows
}

/// Full timeline for `segments`, including silence gaps.
pub fn assemble_timeline(segments: &[TextUnit]) -> Timeline {
    let mut timeline = Timeline::default();
    let mut t = 0.0_f64;

    for unit in segments {
        let span = unit.span_secs().max(0.0);

        if unit.is_silence() {
            if span > 0.0 {
                timeline.gaps.push(Interval::new(t, t + span));
            }
            t += span;
            continue;
        }

        if span <= 0.0 {
            warn!(text = %unit.text, "Narration unit has no duration, no window emitted");
            continue;
        }

        if unit.duration_source != DurationSource::Measured {
            timeline.approximated += 1;
        }

        timeline.windows.push(SubtitleWindow {
            text: unit.text.trim().to_string(),
            start: t,
            end: t + span,
        });
        t += span;
    }

    timeline.total_duration = t;

    if timeline.approximated > 0 {
        warn!(
            approximated = timeline.approximated,
            "Timeline uses unmeasured durations; subtitles may drift from audio"
        );
    }
    debug!(
        windows = timeline.windows.len(),
        gaps = timeline.gaps.len(),
        total_duration = timeline.total_duration,
        "Assembled timeline"
    );

    timeline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(text: &str, secs: f64) -> TextUnit {
        TextUnit::narration(text).with_duration(secs, DurationSource::Measured)
    }

    #[test]
    fn test_windows_follow_running_clock() {
        let units = vec![
            TextUnit::silence(2000),
            measured("Hello", 1.2),
            TextUnit::silence(1500).with_duration(0.5, DurationSource::Measured),
            measured("world", 0.8),
        ];
        let timeline = assemble_timeline(&units);

        assert_eq!(timeline.windows.len(), 2);
        assert_eq!(timeline.windows[0].text, "Hello");
        assert!((timeline.windows[0].start - 2.0).abs() < 1e-9);
        assert!((timeline.windows[0].end - 3.2).abs() < 1e-9);
        assert!((timeline.windows[1].start - 5.2).abs() < 1e-9);
        assert!((timeline.windows[1].end - 6.0).abs() < 1e-9);
        assert!((timeline.total_duration - 6.0).abs() < 1e-9);
        assert_eq!(timeline.gaps.len(), 2);
        assert_eq!(timeline.approximated, 0);
        assert!(timeline.is_monotonic());
    }

    #[test]
    fn test_back_to_back_windows_touch() {
        let windows = assemble(&[measured("a", 1.0), measured("b", 2.0), measured("c", 0.5)]);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_narration_delay_is_not_counted() {
        let mut unit = measured("a", 1.0);
        unit.delay_ms = 1000;
        let timeline = assemble_timeline(&[unit, measured("b", 1.0)]);
        assert!((timeline.windows[1].start - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_narration_is_skipped() {
        let timeline = assemble_timeline(&[TextUnit::narration("x"), measured("y", 1.0)]);
        assert_eq!(timeline.windows.len(), 1);
        assert_eq!(timeline.windows[0].start, 0.0);
    }

    #[test]
    fn test_estimated_durations_are_counted() {
        let estimated = TextUnit::narration("e").with_duration(1.0, DurationSource::Estimated);
        let timeline = assemble_timeline(&[estimated, measured("m", 1.0)]);
        assert_eq!(timeline.approximated, 1);
    }

    #[test]
    fn test_empty_input() {
        let timeline = assemble_timeline(&[]);
        assert!(timeline.windows.is_empty());
        assert_eq!(timeline.total_duration, 0.0);
    }
}
