//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vnarr_media::DEFAULT_CONFIG_FILE;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for per-job intermediate files
    pub work_dir: PathBuf,
    /// Maximum speech synthesis requests in flight per job
    pub tts_concurrency: usize,
    /// Speech synthesis executable (edge-tts compatible CLI)
    pub tts_command: String,
    /// Timeout for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Timeout for a whole render job
    pub job_timeout: Duration,
    /// Persisted motion parameters; defaults to `<work_dir>/best_motion_clip_params.json`
    pub motion_config_path: Option<PathBuf>,
    /// Frame width used for motion analysis; `None` analyses at source size
    pub analysis_width: Option<u32>,
    /// Scan optimizer candidates on the rayon pool
    pub optimizer_parallel: bool,
    /// Decode the source once into memory before a parameter search
    pub optimizer_preload: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vnarr"),
            tts_concurrency: 4,
            tts_command: "edge-tts".to_string(),
            ffmpeg_timeout: Duration::from_secs(1800),
            job_timeout: Duration::from_secs(3600), // 1 hour
            motion_config_path: None,
            analysis_width: Some(160),
            optimizer_parallel: true,
            optimizer_preload: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("VNARR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            tts_concurrency: env_parse("VNARR_TTS_CONCURRENCY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.tts_concurrency),
            tts_command: std::env::var("VNARR_TTS_COMMAND").unwrap_or(defaults.tts_command),
            ffmpeg_timeout: env_parse("VNARR_FFMPEG_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            job_timeout: env_parse("VNARR_JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            motion_config_path: std::env::var("VNARR_MOTION_CONFIG_PATH").ok().map(PathBuf::from),
            // 0 analyses at source resolution
            analysis_width: match env_parse::<u32>("VNARR_ANALYSIS_WIDTH") {
                Some(0) => None,
                Some(w) => Some(w),
                None => defaults.analysis_width,
            },
            optimizer_parallel: env_flag("VNARR_OPTIMIZER_PARALLEL")
                .unwrap_or(defaults.optimizer_parallel),
            optimizer_preload: env_flag("VNARR_OPTIMIZER_PRELOAD")
                .unwrap_or(defaults.optimizer_preload),
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_tts_concurrency(mut self, n: usize) -> Self {
        self.tts_concurrency = n.max(1);
        self
    }

    pub fn with_motion_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.motion_config_path = Some(path.into());
        self
    }

    /// Where tuned motion parameters are read from and saved to.
    pub fn motion_config_path(&self) -> PathBuf {
        self.motion_config_path
            .clone()
            .unwrap_or_else(|| self.work_dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Directory holding one job's intermediate files.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.tts_concurrency, 4);
        assert_eq!(config.job_timeout, Duration::from_secs(3600));
        assert_eq!(
            config.motion_config_path(),
            PathBuf::from("/tmp/vnarr/best_motion_clip_params.json")
        );
    }

    #[test]
    fn test_builders() {
        let config = WorkerConfig::default()
            .with_work_dir("/data/jobs")
            .with_tts_concurrency(0)
            .with_motion_config_path("/etc/vnarr/motion.json");
        assert_eq!(config.tts_concurrency, 1);
        assert_eq!(config.job_dir("abc"), PathBuf::from("/data/jobs/abc"));
        assert_eq!(
            config.motion_config_path(),
            PathBuf::from("/etc/vnarr/motion.json")
        );
    }
}
