//! Speech synthesis through an `edge-tts` compatible command line tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use vnarr_media::audio::render_silence;
use vnarr_media::{probe_duration, FfmpegRunner, MediaError};
use vnarr_narration::{NarrationError, NarrationResult, SpeechSynthesizer, SynthesizedAudio};

use crate::error::{WorkerError, WorkerResult};

/// Writes one MP3 per chunk into `out_dir` and measures it with ffprobe.
#[derive(Debug, Clone)]
pub struct EdgeTtsSynthesizer {
    command: String,
    out_dir: PathBuf,
    runner: FfmpegRunner,
    timeout: Duration,
}

impl EdgeTtsSynthesizer {
    pub fn new(command: impl Into<String>, out_dir: impl AsRef<Path>) -> Self {
        Self {
            command: command.into(),
            out_dir: out_dir.as_ref().to_path_buf(),
            runner: FfmpegRunner::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Runner used for rendering silence (carries cancellation).
    pub fn with_runner(mut self, runner: FfmpegRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail early when the engine is not installed.
    pub fn check_available(&self) -> WorkerResult<PathBuf> {
        which::which(&self.command).map_err(|_| {
            WorkerError::resource(format!("speech engine '{}' not found in PATH", self.command))
        })
    }

    fn chunk_path(&self, index: usize) -> PathBuf {
        self.out_dir.join(format!("chunk_{:04}.mp3", index))
    }

    fn silence_path(&self, index: usize) -> PathBuf {
        self.out_dir.join(format!("silence_{:04}.mp3", index))
    }

    fn command_args(text: &str, voice: &str, output: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            voice.to_string(),
            "--text".to_string(),
            text.to_string(),
            "--write-media".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        index: usize,
    ) -> NarrationResult<SynthesizedAudio> {
        let path = self.chunk_path(index);
        debug!(index, voice, chars = text.chars().count(), "Synthesizing chunk");

        let run = Command::new(&self.command)
            .args(Self::command_args(text, voice, &path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                NarrationError::synthesis_failed(
                    index,
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                NarrationError::synthesis_failed(index, format!("failed to run {}: {}", self.command, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NarrationError::synthesis_failed(
                index,
                stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("engine exited with an error")
                    .to_string(),
            ));
        }
        if !path.exists() {
            return Err(NarrationError::AudioNotFound(path));
        }

        let duration = probe_duration(&path)
            .await
            .map_err(|e| NarrationError::synthesis_failed(index, e.to_string()))?;
        Ok(SynthesizedAudio { path, duration })
    }

    async fn silence(&self, duration: f64, index: usize) -> NarrationResult<SynthesizedAudio> {
        let path = self.silence_path(index);
        render_silence(&path, duration, &self.runner)
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => NarrationError::Cancelled,
                other => NarrationError::synthesis_failed(index, other.to_string()),
            })?;
        Ok(SynthesizedAudio { path, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;

    #[test]
    fn test_command_args() {
        let args = EdgeTtsSynthesizer::command_args(
            "你好",
            "zh-CN-XiaoxiaoNeural",
            Path::new("/tmp/j/chunk_0000.mp3"),
        );
        assert_eq!(
            args,
            vec![
                "--voice",
                "zh-CN-XiaoxiaoNeural",
                "--text",
                "你好",
                "--write-media",
                "/tmp/j/chunk_0000.mp3"
            ]
        );
    }

    #[test]
    fn test_paths_are_indexed() {
        let synth = EdgeTtsSynthesizer::new("edge-tts", "/tmp/job");
        assert_eq!(synth.chunk_path(7), PathBuf::from("/tmp/job/chunk_0007.mp3"));
        assert_eq!(synth.silence_path(2), PathBuf::from("/tmp/job/silence_0002.mp3"));
    }

    #[tokio::test]
    async fn test_silence_honours_runner_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let synth = EdgeTtsSynthesizer::new("edge-tts", dir.path())
            .with_runner(FfmpegRunner::new().with_cancel(rx));
        tx.send_replace(true);

        let result = synth.silence(1.5, 3).await;
        assert!(matches!(result, Err(NarrationError::Cancelled)));
        assert!(!synth.silence_path(3).exists());
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let synth = EdgeTtsSynthesizer::new("vnarr-no-such-engine", "/tmp/job");
        assert!(matches!(synth.check_available(), Err(WorkerError::Resource(_))));

        let result = synth.synthesize("hi", "v", 0).await;
        assert!(matches!(result, Err(NarrationError::SynthesisFailed { index: 0, .. })));
    }
}
