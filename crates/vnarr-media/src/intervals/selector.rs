//! Keep/cut interval resolution.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};
use vnarr_models::{Interval, RawInterval, SegmentsMode, MIN_INTERVAL_SECS};

use crate::error::{MediaError, MediaResult};

fn by_start(a: &Interval, b: &Interval) -> Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| a.end.total_cmp(&b.end))
}

/// Resolve user intervals into the intervals to keep, sorted by start.
///
/// An empty list keeps the whole source. Missing bounds default to `0` and
/// `total_duration`; bounds outside the source are clamped. In `cut` mode the
/// result is the complement over `[0, total_duration]`. Overlapping `keep`
/// intervals are passed through unmerged.
pub fn resolve(
    raw: &[RawInterval],
    mode: SegmentsMode,
    total_duration: f64,
) -> MediaResult<Vec<Interval>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "source duration {} is not positive",
            total_duration
        )));
    }

    if raw.is_empty() {
        return Ok(vec![Interval::new(0.0, total_duration)]);
    }

    let mut intervals = Vec::with_capacity(raw.len());
    for (index, r) in raw.iter().enumerate() {
        let interval = r.resolve(total_duration)?;
        if !interval.start.is_finite() || !interval.end.is_finite() {
            return Err(MediaError::invalid_interval(format!(
                "interval {} has a non-finite bound",
                index
            )));
        }
        if interval.start > interval.end {
            return Err(MediaError::invalid_interval(format!(
                "interval {} starts after it ends ({})",
                index, interval
            )));
        }

        let clamped = Interval::new(
            interval.start.clamp(0.0, total_duration),
            interval.end.clamp(0.0, total_duration),
        );
        if clamped != interval {
            warn!(
                index,
                requested = %interval,
                clamped = %clamped,
                total_duration,
                "Interval exceeds source bounds, clamping"
            );
        }
        intervals.push(clamped);
    }

    intervals.sort_by(by_start);

    Ok(match mode {
        SegmentsMode::Keep => intervals,
        SegmentsMode::Cut => complement(&intervals, total_duration),
    })
}

/// Gaps between `sorted` intervals over `[0, total_duration]`.
pub fn complement(sorted: &[Interval], total_duration: f64) -> Vec<Interval> {
    let mut out = Vec::with_capacity(sorted.len() + 1);
    let mut last_end = 0.0_f64;
    for cut in sorted {
        if cut.start > last_end {
            out.push(Interval::new(last_end, cut.start));
        }
        last_end = last_end.max(cut.end);
    }
    if last_end < total_duration {
        out.push(Interval::new(last_end, total_duration));
    }
    out
}

/// Drop intervals too short to extract.
pub fn filter_short(intervals: Vec<Interval>) -> Vec<Interval> {
    intervals
        .into_iter()
        .filter(|i| i.duration() > MIN_INTERVAL_SECS)
        .collect()
}

/// Number of sorted intervals that overlap an earlier one.
fn count_overlaps(sorted: &[Interval]) -> usize {
    let mut max_end = f64::NEG_INFINITY;
    let mut overlaps = 0;
    for interval in sorted {
        if interval.start < max_end {
            overlaps += 1;
        }
        max_end = max_end.max(interval.end);
    }
    overlaps
}

/// Intervals ready for extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub intervals: Vec<Interval>,
    pub mode: SegmentsMode,
    /// Keep intervals overlapping an earlier one (duplicated footage).
    pub overlaps: usize,
    /// Intervals removed by the minimum-length filter.
    pub dropped: usize,
}

impl Selection {
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(Interval::duration).sum()
    }
}

/// Resolve, flag overlaps and filter. An empty result is an error.
pub fn select(
    raw: &[RawInterval],
    mode: SegmentsMode,
    total_duration: f64,
) -> MediaResult<Selection> {
    let resolved = resolve(raw, mode, total_duration)?;

    let overlaps = match mode {
        SegmentsMode::Keep => count_overlaps(&resolved),
        SegmentsMode::Cut => 0,
    };
    if overlaps > 0 {
        warn!(
            overlaps,
            "Keep intervals overlap; overlapping footage will appear more than once"
        );
    }

    let requested = resolved.len();
    let intervals = filter_short(resolved);
    let dropped = requested - intervals.len();
    if intervals.is_empty() {
        return Err(MediaError::NothingToKeep { requested });
    }

    debug!(
        mode = %mode,
        kept = intervals.len(),
        dropped,
        "Intervals selected"
    );
    Ok(Selection {
        intervals,
        mode,
        overlaps,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnarr_models::TimeValue;

    fn pairs(intervals: &[Interval]) -> Vec<(f64, f64)> {
        intervals.iter().map(|i| (i.start, i.end)).collect()
    }

    #[test]
    fn test_cut_mode_complement() {
        let raw = vec![RawInterval::seconds(5.0, 15.0), RawInterval::seconds(25.0, 35.0)];
        let out = resolve(&raw, SegmentsMode::Cut, 40.0).unwrap();
        assert_eq!(pairs(&out), vec![(0.0, 5.0), (15.0, 25.0), (35.0, 40.0)]);
    }

    #[test]
    fn test_empty_keeps_everything() {
        for mode in [SegmentsMode::Keep, SegmentsMode::Cut] {
            let out = resolve(&[], mode, 12.3).unwrap();
            assert_eq!(pairs(&out), vec![(0.0, 12.3)]);
        }
    }

    #[test]
    fn test_keep_mode_sorts_without_merging() {
        let raw = vec![RawInterval::seconds(10.0, 20.0), RawInterval::seconds(2.0, 12.0)];
        let selection = select(&raw, SegmentsMode::Keep, 30.0).unwrap();
        assert_eq!(pairs(&selection.intervals), vec![(2.0, 12.0), (10.0, 20.0)]);
        assert_eq!(selection.overlaps, 1);
        assert!((selection.total_duration() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_bounds_default_to_source() {
        let raw = vec![
            RawInterval {
                start: None,
                end: Some(TimeValue::Seconds(3.0)),
            },
            RawInterval {
                start: Some(TimeValue::Timestamp("00:00:08.500".into())),
                end: None,
            },
        ];
        let out = resolve(&raw, SegmentsMode::Cut, 10.0).unwrap();
        assert_eq!(pairs(&out), vec![(3.0, 8.5)]);
    }

    #[test]
    fn test_complement_law() {
        let raw = vec![
            RawInterval::seconds(30.0, 32.0),
            RawInterval::seconds(1.0, 4.0),
            RawInterval::seconds(3.0, 6.0),
            RawInterval::seconds(6.0, 9.0),
        ];
        let cut = resolve(&raw, SegmentsMode::Cut, 40.0).unwrap();
        let keep = resolve(&raw, SegmentsMode::Keep, 40.0).unwrap();
        assert_eq!(cut, complement(&keep, 40.0));
        assert_eq!(pairs(&cut), vec![(0.0, 1.0), (9.0, 30.0), (32.0, 40.0)]);
    }

    /// Deterministic generator for table-driven cases.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) % n
        }
    }

    #[test]
    fn test_complement_partitions_generated_sources() {
        let mut rng = Lcg(0x5eed);
        for case in 0..300 {
            // Bounds on a quarter-second grid, sometimes past the source end.
            let quarters = 4 + rng.below(157);
            let total = quarters as f64 / 4.0;
            let raw: Vec<RawInterval> = (0..rng.below(7))
                .map(|_| {
                    let a = rng.below(quarters + 9) as f64 / 4.0;
                    let b = rng.below(quarters + 9) as f64 / 4.0;
                    RawInterval::seconds(a.min(b), a.max(b))
                })
                .collect();

            let keep = resolve(&raw, SegmentsMode::Keep, total).unwrap();
            let cut = resolve(&raw, SegmentsMode::Cut, total).unwrap();
            if raw.is_empty() {
                assert_eq!(cut, keep, "case {case}");
                continue;
            }
            assert_eq!(cut, complement(&keep, total), "case {case}");

            for pair in cut.windows(2) {
                assert!(pair[0].end <= pair[1].start, "case {case}: {:?}", cut);
            }
            for gap in &cut {
                assert!(gap.start >= 0.0 && gap.end <= total && gap.start < gap.end);
            }

            // Every point off the grid lies in exactly one side.
            for q in 0..quarters {
                let t = q as f64 / 4.0 + 0.125;
                let kept = keep.iter().any(|i| i.start < t && t < i.end);
                let removed = cut.iter().any(|i| i.start < t && t < i.end);
                assert!(kept != removed, "case {case}: t={t} raw={:?}", raw);
            }
        }
    }

    #[test]
    fn test_overlapping_cuts_extend_last_end() {
        let raw = vec![RawInterval::seconds(0.0, 10.0), RawInterval::seconds(2.0, 5.0)];
        let out = resolve(&raw, SegmentsMode::Cut, 12.0).unwrap();
        assert_eq!(pairs(&out), vec![(10.0, 12.0)]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let raw = vec![RawInterval::seconds(8.0, 50.0)];
        let out = resolve(&raw, SegmentsMode::Keep, 10.0).unwrap();
        assert_eq!(pairs(&out), vec![(8.0, 10.0)]);
    }

    #[test]
    fn test_inverted_interval_is_config_error() {
        let raw = vec![RawInterval::seconds(9.0, 3.0)];
        let result = resolve(&raw, SegmentsMode::Keep, 10.0);
        assert!(matches!(result, Err(MediaError::InvalidInterval(_))));
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn test_bad_timestamp_is_config_error() {
        let raw = vec![RawInterval {
            start: Some(TimeValue::Timestamp("1:2:3:4".into())),
            end: None,
        }];
        let result = resolve(&raw, SegmentsMode::Cut, 10.0);
        assert!(matches!(result, Err(MediaError::InvalidInterval(_))));
    }

    #[test]
    fn test_short_intervals_are_filtered() {
        let raw = vec![RawInterval::seconds(0.0, 0.04), RawInterval::seconds(1.0, 3.0)];
        let selection = select(&raw, SegmentsMode::Keep, 5.0).unwrap();
        assert_eq!(pairs(&selection.intervals), vec![(1.0, 3.0)]);
        assert_eq!(selection.dropped, 1);
    }

    #[test]
    fn test_nothing_to_keep() {
        let raw = vec![RawInterval::seconds(0.0, 10.0)];
        let result = select(&raw, SegmentsMode::Cut, 10.0);
        assert!(matches!(result, Err(MediaError::NothingToKeep { requested: 0 })));

        let raw = vec![RawInterval::seconds(0.0, 9.98)];
        let result = select(&raw, SegmentsMode::Cut, 10.0);
        assert!(matches!(result, Err(MediaError::NothingToKeep { requested: 1 })));
    }

    #[test]
    fn test_non_positive_duration() {
        let result = resolve(&[], SegmentsMode::Keep, 0.0);
        assert!(matches!(result, Err(MediaError::InvalidVideo(_))));
    }
}
