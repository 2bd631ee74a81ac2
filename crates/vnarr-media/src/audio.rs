//! Narration track assembly.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::intervals::write_concat_list;

/// Sample rate of generated silence; matches the speech engine's output.
pub const SILENCE_SAMPLE_RATE: u32 = 24_000;

/// Command producing `duration` seconds of mono silence.
pub fn silence_command(output: &Path, duration: f64) -> FfmpegCommand {
    FfmpegCommand::lavfi(
        format!("anullsrc=r={}:cl=mono", SILENCE_SAMPLE_RATE),
        output,
    )
    .output_duration(duration)
}

/// Render a silent audio file.
pub async fn render_silence(output: &Path, duration: f64, runner: &FfmpegRunner) -> MediaResult<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(MediaError::internal(format!(
            "silence duration must be positive, got {}",
            duration
        )));
    }
    debug!(output = %output.display(), duration, "Rendering silence");
    runner.run(&silence_command(output, duration)).await
}

/// Command joining the files named in `list` into one AAC track.
pub fn concat_audio_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(list, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .output_arg("-vn")
        .audio_codec("aac")
        .audio_bitrate("128k")
}

/// Concatenate audio chunks in order. Chunks may differ in encoder
/// settings, so the result is re-encoded.
pub async fn concat_audio(
    inputs: &[PathBuf],
    output: &Path,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::internal("no audio chunks to concatenate"));
    }
    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(MediaError::FileNotFound(missing.clone()));
    }

    let temp_dir = tempfile::tempdir()?;
    let list = write_concat_list(temp_dir.path(), inputs).await?;
    runner.run(&concat_audio_command(&list, output)).await?;

    info!(chunks = inputs.len(), output = %output.display(), "Narration track assembled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_command() {
        let args = silence_command(Path::new("s.mp3"), 2.5).build_args();
        assert!(args.contains(&"anullsrc=r=24000:cl=mono".to_string()));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "2.500");
        assert_eq!(args.last().unwrap(), "s.mp3");
    }

    #[test]
    fn test_concat_audio_reencodes() {
        let args = concat_audio_command(Path::new("l.txt"), Path::new("n.m4a")).build_args();
        assert!(args.contains(&"aac".to_string()));
        assert!(!args.contains(&"copy".to_string()));
    }

    #[test]
    fn test_non_positive_silence_rejected() {
        let runner = FfmpegRunner::new();
        let result = tokio_test::block_on(render_silence(Path::new("s.mp3"), 0.0, &runner));
        assert!(matches!(result, Err(MediaError::Internal(_))));
    }

    #[tokio::test]
    async fn test_missing_chunk() {
        let result = concat_audio(
            &[PathBuf::from("/nonexistent/a.mp3")],
            Path::new("out.m4a"),
            &FfmpegRunner::new(),
        )
        .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
