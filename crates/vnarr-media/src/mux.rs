//! Final mux of video, narration and subtitles.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Inputs and output of the final render.
#[derive(Debug, Clone)]
pub struct MuxJob {
    pub video: PathBuf,
    pub audio: PathBuf,
    /// SRT carried as a soft `mov_text` track.
    pub subtitles: Option<PathBuf>,
    pub output: PathBuf,
    /// Length of the trimmed video; the output stops here.
    pub video_duration: f64,
}

impl MuxJob {
    pub fn new(
        video: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
        video_duration: f64,
    ) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
            audio: audio.as_ref().to_path_buf(),
            subtitles: None,
            output: output.as_ref().to_path_buf(),
            video_duration,
        }
    }

    pub fn with_subtitles(mut self, srt: impl AsRef<Path>) -> Self {
        self.subtitles = Some(srt.as_ref().to_path_buf());
        self
    }

    /// Video stream copied, narration replaces the original audio.
    pub fn build_command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.video, &self.output).add_input(&self.audio);
        if let Some(srt) = &self.subtitles {
            cmd = cmd.add_input(srt);
        }

        cmd = cmd.map("0:v:0").map("1:a:0");
        if self.subtitles.is_some() {
            cmd = cmd.map("2:s:0").subtitle_codec("mov_text");
        }

        cmd.video_codec("copy")
            .audio_codec("aac")
            .audio_bitrate("128k")
            .stop_at(self.video_duration)
            .output_args(["-movflags", "+faststart"])
    }

    pub async fn run(&self, runner: &FfmpegRunner) -> MediaResult<()> {
        for path in [Some(&self.video), Some(&self.audio), self.subtitles.as_ref()]
            .into_iter()
            .flatten()
        {
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.clone()));
            }
        }
        if !self.video_duration.is_finite() || self.video_duration <= 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "trimmed video duration {} is not positive",
                self.video_duration
            )));
        }

        runner.run(&self.build_command()).await?;
        info!(
            output = %self.output.display(),
            duration = self.video_duration,
            subtitles = self.subtitles.is_some(),
            "Final render muxed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], value: &str) -> usize {
        args.iter().position(|a| a == value).unwrap()
    }

    #[test]
    fn test_mux_with_subtitles() {
        let args = MuxJob::new("v.mp4", "n.m4a", "out.mp4", 42.0)
            .with_subtitles("subs.srt")
            .build_command()
            .build_args();

        assert!(position(&args, "subs.srt") < position(&args, "-map"));
        assert!(args.contains(&"2:s:0".to_string()));
        assert!(args.contains(&"mov_text".to_string()));
        assert_eq!(args[position(&args, "-to") + 1], "42.000");
        assert_eq!(args[position(&args, "-c:v") + 1], "copy");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_mux_without_subtitles() {
        let args = MuxJob::new("v.mp4", "n.m4a", "out.mp4", 10.0)
            .build_command()
            .build_args();
        assert!(!args.contains(&"mov_text".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let job = MuxJob::new("/nonexistent/v.mp4", "/nonexistent/n.m4a", "out.mp4", 10.0);
        let result = job.run(&FfmpegRunner::new()).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
