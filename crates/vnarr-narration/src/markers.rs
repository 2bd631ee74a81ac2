//! Inline silence markers.
//!
//! Narration text may embed pauses as `{2s}`, `{1.5s}` or `{800ms}`.
//! Seconds are converted to whole milliseconds, truncating any remainder.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+(?:\.\d+)?)(s|ms)\}").unwrap());

/// A parsed pause marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeMarker {
    /// Character offset of the marker in the source text.
    pub position: usize,
    pub delay_ms: u64,
}

/// One span of marker-split text, in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSpan<'a> {
    /// Text between markers, untrimmed and possibly empty.
    Text(&'a str),
    Silence(u64),
}

fn delay_from(caps: &Captures<'_>) -> u64 {
    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let ms = match &caps[2] {
        "s" => value * 1000.0,
        _ => value,
    };
    ms.trunc().max(0.0) as u64
}

/// All markers in `text`, left to right.
pub fn find_markers(text: &str) -> Vec<TimeMarker> {
    MARKER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(TimeMarker {
                position: text[..whole.start()].chars().count(),
                delay_ms: delay_from(&caps),
            })
        })
        .collect()
}

/// Split `text` into alternating text and silence spans.
///
/// Text before the first marker, between markers and after the last one
/// is always emitted (possibly empty) so callers can see the exact order.
pub fn parse_markers(text: &str) -> Vec<MarkerSpan<'_>> {
    let mut spans = Vec::new();
    let mut last_end = 0;

    for caps in MARKER_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        spans.push(MarkerSpan::Text(&text[last_end..whole.start()]));
        spans.push(MarkerSpan::Silence(delay_from(&caps)));
        last_end = whole.end();
    }
    spans.push(MarkerSpan::Text(&text[last_end..]));

    spans
}

/// Whether `text` contains at least one marker.
pub fn has_markers(text: &str) -> bool {
    MARKER_PATTERN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alternating_spans() {
        let spans = parse_markers("{2000ms}Hello{1500ms}world");
        assert_eq!(
            spans,
            vec![
                MarkerSpan::Text(""),
                MarkerSpan::Silence(2000),
                MarkerSpan::Text("Hello"),
                MarkerSpan::Silence(1500),
                MarkerSpan::Text("world"),
            ]
        );
    }

    #[test]
    fn test_seconds_are_converted_to_ms() {
        let markers = find_markers("a{2s}b{1.5s}c{0.0015s}");
        let delays: Vec<u64> = markers.iter().map(|m| m.delay_ms).collect();
        assert_eq!(delays, vec![2000, 1500, 1]);
    }

    #[test]
    fn test_marker_positions_count_chars() {
        let markers = find_markers("你好{3s}世界");
        assert_eq!(markers, vec![TimeMarker { position: 2, delay_ms: 3000 }]);
    }

    #[test]
    fn test_text_without_markers_is_single_span() {
        assert!(!has_markers("plain text 5s later"));
        assert_eq!(parse_markers("plain"), vec![MarkerSpan::Text("plain")]);
    }

    #[test]
    fn test_fractional_milliseconds_truncate() {
        assert_eq!(find_markers("{12.9ms}")[0].delay_ms, 12);
    }
}
