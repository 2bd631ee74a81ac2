//! Cut selected intervals out of the source and join them.
//!
//! # Strategy
//!
//! Each interval is extracted to its own file with a two-stage seek (fast
//! input seek to a few seconds before the start, then an accurate output
//! seek) and re-encoded so cuts are frame accurate. The pieces are then
//! joined with the concat demuxer using stream copy.

use std::path::{Path, PathBuf};

use metrics::counter;
use tracing::{debug, info};
use vnarr_models::Interval;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::names;

/// How far before the cut the input seek lands.
const FAST_SEEK_LEAD_SECS: f64 = 5.0;

/// Command extracting `interval` from `input` into `output`.
pub fn extract_command(input: &Path, output: &Path, interval: &Interval) -> FfmpegCommand {
    let fast_seek = (interval.start - FAST_SEEK_LEAD_SECS).max(0.0);
    let accurate_seek = interval.start - fast_seek;

    FfmpegCommand::new(input, output)
        .seek(fast_seek)
        .output_seek(accurate_seek)
        .output_duration(interval.duration())
        .video_codec("libx264")
        .preset("veryfast")
        .crf(20)
        .audio_codec("aac")
        .audio_bitrate("128k")
        .output_args(["-avoid_negative_ts", "make_zero"])
}

/// Concat demuxer list; single quotes in paths are escaped.
pub(crate) fn concat_list_content(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', r"'\''")))
        .collect()
}

/// Write a concat list for `paths` into `dir` and return its path.
pub(crate) async fn write_concat_list(dir: &Path, paths: &[PathBuf]) -> MediaResult<PathBuf> {
    let list = dir.join("concat.txt");
    tokio::fs::write(&list, concat_list_content(paths)).await?;
    Ok(list)
}

/// Command joining the files named in `list` without re-encoding.
pub(crate) fn concat_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(list, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .output_args(["-c", "copy", "-movflags", "+faststart"])
}

/// Extract `intervals` from `input` in list order and concatenate them into `output`.
pub async fn extract_and_concat(
    input: &Path,
    output: &Path,
    intervals: &[Interval],
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    if intervals.is_empty() {
        return Err(MediaError::NothingToKeep { requested: 0 });
    }
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    if let [only] = intervals {
        debug!(interval = %only, "Single interval, extracting directly");
        runner.run(&extract_command(input, output, only)).await?;
        counter!(names::INTERVALS_EXTRACTED_TOTAL).increment(1);
        return Ok(());
    }

    let temp_dir = tempfile::tempdir()?;
    let mut pieces = Vec::with_capacity(intervals.len());

    for (i, interval) in intervals.iter().enumerate() {
        let piece = temp_dir.path().join(format!("seg_{:04}.mp4", i));
        debug!(segment = i, interval = %interval, "Extracting interval");
        runner
            .run(&extract_command(input, &piece, interval))
            .await
            .map_err(|e| match e {
                MediaError::FfmpegFailed {
                    message,
                    stderr,
                    exit_code,
                } => MediaError::ffmpeg_failed(
                    format!("Segment {} extraction failed: {}", i, message),
                    stderr,
                    exit_code,
                ),
                other => other,
            })?;
        counter!(names::INTERVALS_EXTRACTED_TOTAL).increment(1);
        pieces.push(piece);
    }

    let list = write_concat_list(temp_dir.path(), &pieces).await?;
    runner.run(&concat_command(&list, output)).await?;

    info!(
        segments = intervals.len(),
        output = %output.display(),
        "Intervals extracted and concatenated"
    );
    Ok(())
}
