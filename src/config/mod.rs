//! Configuration loading and validation.
//!
//! Two layers: the local [`AppConfig`] TOML file (where the data lives, how
//! fast to write) and the [`ToplistConfig`] document kept in the document
//! store alongside the data it describes.

mod toplist;

pub use toplist::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration document not found: {0}")]
    MissingDocument(String),

    #[error("Malformed configuration document {path}: {source}")]
    MalformedDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Delay between toplist page writes
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Trailing window for the guild average batch in `run`
    #[serde(default = "default_guild_window_hours")]
    pub guild_window_hours: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_throttle_ms() -> u64 {
    150
}

fn default_guild_window_hours() -> u32 {
    48
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            throttle_ms: default_throttle_ms(),
            guild_window_hours: default_guild_window_hours(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "data_dir must not be empty".to_string(),
            ));
        }

        if self.throttle_ms > 60_000 {
            return Err(ConfigError::ValidationError(
                "throttle_ms must be at most 60000".to_string(),
            ));
        }

        if self.guild_window_hours == 0 {
            return Err(ConfigError::ValidationError(
                "guild_window_hours must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
