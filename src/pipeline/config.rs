// Startup configuration, read from <project_dir>/.barloop/config.json and
// written back with defaults the first time.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::MAX_SLOTS;

pub const BARLOOP_DIR: &str = ".barloop";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("config file {path} is not valid JSON: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    pub num_slots: usize,
    pub queue_capacity: usize, // pending clip starts per bar, reserved up front
    pub clips_dir: Option<PathBuf>, // relative paths resolve against the project dir
    pub default_loop_bars: u32, // for files without a `_<N>bar` tag
    pub bpm: f64,
    pub numerator: u32,
    pub denominator: u32,
    pub max_block_size: usize, // render chunk; device buffers are split to fit
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            num_slots: 8,
            queue_capacity: 256,
            clips_dir: None,
            default_loop_bars: 1,
            bpm: 120.0,
            numerator: 4,
            denominator: 4,
            max_block_size: 4096,
        }
    }
}

impl LooperConfig {
    /// Clamps out-of-range values instead of refusing to start.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.num_slots == 0 || self.num_slots > MAX_SLOTS {
            log::warn!("num_slots {} out of range, clamping to 1..={MAX_SLOTS}", self.num_slots);
            self.num_slots = self.num_slots.clamp(1, MAX_SLOTS);
        }
        if self.queue_capacity == 0 {
            log::warn!("queue_capacity must be positive, using {}", defaults.queue_capacity);
            self.queue_capacity = defaults.queue_capacity;
        }
        if self.default_loop_bars == 0 {
            log::warn!("default_loop_bars must be positive, using 1");
            self.default_loop_bars = 1;
        }
        if !(self.bpm > 0.0 && self.bpm.is_finite()) {
            log::warn!("bpm {} is unusable, using {}", self.bpm, defaults.bpm);
            self.bpm = defaults.bpm;
        }
        if self.numerator == 0 || self.denominator == 0 {
            log::warn!("time signature {}/{} is unusable, using 4/4", self.numerator, self.denominator);
            self.numerator = defaults.numerator;
            self.denominator = defaults.denominator;
        }
        if self.max_block_size == 0 {
            log::warn!("max_block_size must be positive, using {}", defaults.max_block_size);
            self.max_block_size = defaults.max_block_size;
        }
        self
    }

    pub fn clips_dir(&self, project_dir: &Path) -> PathBuf {
        match &self.clips_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_dir.join(dir),
            None => project_dir.to_path_buf(),
        }
    }
}

// <project_dir>/.barloop/config.json
fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BARLOOP_DIR).join(CONFIG_FILE)
}

/// Reads the config, writing a default one if none exists yet. A malformed
/// file is an error rather than silently replaced.
pub fn load_or_create(project_dir: &Path) -> Result<LooperConfig, ConfigError> {
    let path = config_file_path(project_dir);
    let io_err = |source| ConfigError::Io { path: path.clone(), source };

    if !path.exists() {
        let config = LooperConfig::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&config).map_err(|source| ConfigError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(io_err)?;
        log::info!("wrote default config to {}", path.display());
        return Ok(config);
    }

    let data = std::fs::read_to_string(&path).map_err(io_err)?;
    let config: LooperConfig = serde_json::from_str(&data).map_err(|source| ConfigError::Json {
        path: path.clone(),
        source,
    })?;
    Ok(config.sanitized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_create(dir.path()).unwrap();
        assert_eq!(config, LooperConfig::default());
        assert!(config_file_path(dir.path()).exists());
    }

    #[test]
    fn partial_file_fills_in_defaults_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "num_slots": 40, "bpm": -5, "clips_dir": "loops" }"#).unwrap();

        let config = load_or_create(dir.path()).unwrap();
        assert_eq!(config.num_slots, MAX_SLOTS);
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.clips_dir(dir.path()), dir.path().join("loops"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(load_or_create(dir.path()), Err(ConfigError::Json { .. })));
    }
}
