//! SRT serialisation of subtitle windows.

use std::fmt::Write as _;
use std::path::Path;

use vnarr_models::SubtitleWindow;

use crate::error::NarrationResult;

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000
    )
}

/// Render windows as an SRT document. Cues are numbered from 1.
pub fn to_srt(windows: &[SubtitleWindow]) -> String {
    let mut out = String::new();
    for (i, window) in windows.iter().enumerate() {
        let _ = writeln!(out, "{}", i + 1);
        let _ = writeln!(
            out,
            "{} --> {}",
            format_srt_time(window.start),
            format_srt_time(window.end)
        );
        let _ = writeln!(out, "{}", window.text.trim());
        out.push('\n');
    }
    out
}

/// Write windows to `path` as SRT.
pub async fn write_srt(path: &Path, windows: &[SubtitleWindow]) -> NarrationResult<()> {
    tokio::fs::write(path, to_srt(windows)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3.2), "00:00:03,200");
        assert_eq!(format_srt_time(3661.005), "01:01:01,005");
    }

    #[test]
    fn test_to_srt() {
        let windows = vec![
            SubtitleWindow { text: "Hello".into(), start: 2.0, end: 3.2 },
            SubtitleWindow { text: "world".into(), start: 5.2, end: 6.0 },
        ];
        let srt = to_srt(&windows);
        assert_eq!(
            srt,
            "1\n00:00:02,000 --> 00:00:03,200\nHello\n\n2\n00:00:05,200 --> 00:00:06,000\nworld\n\n"
        );
    }

    #[tokio::test]
    async fn test_write_srt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let windows = vec![SubtitleWindow { text: "hi".into(), start: 0.0, end: 1.0 }];
        write_srt(&path, &windows).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:01,000\nhi"));
    }
}
