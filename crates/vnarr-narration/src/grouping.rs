//! Duration-based grouping of timed narration units.

use vnarr_models::{DurationSource, TextUnit};

/// Merge consecutive narration units until adding the next one would
/// exceed `target_secs`. Silence flushes the open group and is kept as-is.
///
/// Grouped texts are joined with a single space. A unit longer than the
/// target on its own still forms one group.
pub fn group_by_duration(units: &[TextUnit], target_secs: f64) -> Vec<TextUnit> {
    let mut out = Vec::new();
    let mut group: Vec<&TextUnit> = Vec::new();
    let mut group_duration = 0.0;

    for unit in units {
        if unit.is_silence() {
            flush(&mut group, &mut group_duration, &mut out);
            if unit.is_timed_silence() {
                out.push(unit.clone());
            }
            continue;
        }

        if !group.is_empty() && group_duration + unit.duration > target_secs {
            flush(&mut group, &mut group_duration, &mut out);
        }
        group_duration += unit.duration;
        group.push(unit);
    }
    flush(&mut group, &mut group_duration, &mut out);

    out
}

fn flush(group: &mut Vec<&TextUnit>, duration: &mut f64, out: &mut Vec<TextUnit>) {
    if group.is_empty() {
        return;
    }

    let text = group
        .iter()
        .map(|u| u.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let source = weakest_source(group.iter().map(|u| u.duration_source));
    out.push(TextUnit::narration(text).with_duration(*duration, source));

    group.clear();
    *duration = 0.0;
}

/// A group is only as reliable as its least reliable member.
fn weakest_source(sources: impl Iterator<Item = DurationSource>) -> DurationSource {
    sources
        .min_by_key(|s| match s {
            DurationSource::Unknown => 0,
            DurationSource::Estimated => 1,
            DurationSource::Measured => 2,
        })
        .unwrap_or_default()
}
