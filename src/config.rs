use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::kernel::emitter::DEFAULT_EMITTER_CAPACITY;
use crate::kernel::time::DEBOUNCE_DELAY_MS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid config {path}: debounce_ms {value} exceeds {max}")]
    DebounceTooLarge { path: String, value: u64, max: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub debounce_ms: u64,
    /// Surfaces that never come back within the debounce window (engine-hosted
    /// players and the like). Stopping the last of them backgrounds at once.
    pub immediate_background_surfaces: HashSet<String>,
    /// Also emit a screen view on every Started/Stopped.
    pub auto_track_screens: bool,
    pub emitter_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_DELAY_MS,
            immediate_background_surfaces: HashSet::new(),
            auto_track_screens: false,
            emitter_capacity: DEFAULT_EMITTER_CAPACITY,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        // Timestamps are signed milliseconds; a larger window cannot be compared.
        if i64::try_from(config.debounce_ms).is_err() {
            return Err(ConfigError::DebounceTooLarge {
                path: path.display().to_string(),
                value: config.debounce_ms,
                max: i64::MAX,
            });
        }
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn with_immediate_background(mut self, surface: &str) -> Self {
        self.immediate_background_surfaces.insert(surface.to_string());
        self
    }

    pub fn backgrounds_immediately(&self, surface: &str) -> bool {
        self.immediate_background_surfaces.contains(surface)
    }
}
