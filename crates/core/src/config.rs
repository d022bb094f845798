use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use drill_transport::{DEFAULT_CHUNK_SECONDS, coerce_rate, params::coerce_seconds};
use tracing::warn;

use crate::error::ConfigError;
use crate::playback::EngineSettings;

/// What `resume` plays after a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Replay the paused segment from its start.
    #[default]
    RestartSegment,
    /// Pick up from the playhead position captured at pause time.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Delay between stopping one segment and starting the next.
    pub advance_gap_ms: u64,
    pub resume: ResumePolicy,
    /// Move the backend playhead back to 0 whenever playback stops.
    pub rewind_on_stop: bool,
    pub default_rate: f64,
    pub chunk_seconds: f64,
    pub default_repeat: u32,
    pub global_repeat: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            advance_gap_ms: 50,
            resume: ResumePolicy::default(),
            rewind_on_stop: false,
            default_rate: 1.0,
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            default_repeat: 1,
            global_repeat: 1,
        }
    }
}

impl PlayerConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("drill").join("config.toml"))
    }

    /// Load from the user config directory. A missing or unreadable file
    /// yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring config file");
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        Ok(config.sanitized())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply the same corrections user input gets.
    pub fn sanitized(self) -> Self {
        Self {
            default_rate: coerce_rate(self.default_rate),
            chunk_seconds: coerce_seconds(self.chunk_seconds, DEFAULT_CHUNK_SECONDS),
            default_repeat: self.default_repeat.max(1),
            global_repeat: self.global_repeat.max(1),
            ..self
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            advance_gap: Duration::from_millis(self.advance_gap_ms),
            resume: self.resume,
            rewind_on_stop: self.rewind_on_stop,
        }
    }
}
