//! Configuration file loading for analysis.
//!
//! Settings live in `analysis.toml`. Every field has a default, so an empty
//! or missing file gives a working configuration that runs `stockfish` from
//! `PATH`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineOptions;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// How to start one engine version.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct EngineSpec {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Extra command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Analysis settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Maximum search depth for position analysis.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Hard time budget per search in milliseconds.
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    /// Extra searches run per position to collect alternative moves.
    #[serde(default = "default_alternative_attempts")]
    pub alternative_attempts: usize,
    /// `Threads` option sent to every engine.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// `Hash` option (MB) sent to every engine.
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    /// Budget for the UCI handshake in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// How long to wait for `bestmove` after `stop`, in milliseconds.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Engine version used when a request does not name one.
    #[serde(default = "default_engine")]
    pub default_engine: String,
    /// Map of engine versions to their executables.
    #[serde(default)]
    pub engines: HashMap<String, EngineSpec>,
}

fn default_depth() -> u32 {
    15
}

fn default_time_limit_ms() -> u64 {
    1000
}

fn default_alternative_attempts() -> usize {
    2
}

fn default_threads() -> u32 {
    1
}

fn default_hash_mb() -> u32 {
    16
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_stop_grace_ms() -> u64 {
    250
}

fn default_engine() -> String {
    "stockfish".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            time_limit_ms: default_time_limit_ms(),
            alternative_attempts: default_alternative_attempts(),
            threads: default_threads(),
            hash_mb: default_hash_mb(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            default_engine: default_engine(),
            engines: HashMap::new(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the configuration from [`Self::config_path()`], or defaults if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns the path to the configuration file.
    ///
    /// Currently returns `analysis.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("analysis.toml")
    }

    /// Engine tuning and protocol timing derived from these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self.threads,
            hash_mb: self.hash_mb,
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            stop_grace: Duration::from_millis(self.stop_grace_ms),
        }
    }
}
