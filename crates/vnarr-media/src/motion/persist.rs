//! JSON persistence of the tuned motion configuration.

use std::path::Path;

use tracing::info;
use vnarr_models::MotionConfig;

use crate::error::{MediaError, MediaResult};

/// File name used next to the working directory when none is configured.
pub const DEFAULT_CONFIG_FILE: &str = "best_motion_clip_params.json";

/// Load a saved configuration, falling back to defaults when the file is absent.
///
/// A file that exists but does not parse is an error.
pub async fn load_motion_config(path: impl AsRef<Path>) -> MediaResult<MotionConfig> {
    let path = path.as_ref();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved motion config, using defaults");
            return Ok(MotionConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    let corrupt = |e: serde_json::Error| {
        MediaError::invalid_config(format!("corrupt motion config {}: {}", path.display(), e))
    };
    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(corrupt)?;
    let has_threshold = value.get("motion_threshold").is_some();
    let mut config: MotionConfig = serde_json::from_value(value).map_err(corrupt)?;
    // The serde default is on the pixel scale.
    if !has_threshold {
        config.motion_threshold = config.metric.default_threshold();
    }
    validate(&config)
        .map_err(|msg| MediaError::invalid_config(format!("{}: {}", path.display(), msg)))?;
    Ok(config)
}

/// Write `config` atomically (temp file + rename).
pub async fn save_motion_config(path: impl AsRef<Path>, config: &MotionConfig) -> MediaResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(
        path = %path.display(),
        threshold = config.motion_threshold,
        min_static = config.min_static_duration,
        step = config.sample_step,
        "Saved motion config"
    );
    Ok(())
}

fn validate(config: &MotionConfig) -> Result<(), String> {
    if !config.motion_threshold.is_finite() {
        return Err("motion_threshold must be finite".to_string());
    }
    if !config.min_static_duration.is_finite() || config.min_static_duration < 0.0 {
        return Err("min_static_duration must be a non-negative number".to_string());
    }
    if config.sample_step == 0 {
        return Err("sample_step must be at least 1".to_string());
    }
    Ok(())
}
