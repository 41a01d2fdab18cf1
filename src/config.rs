//! Configuration for tnfilter.
//!
//! Loaded from `~/.tnfilter/config.toml` unless a path is given:
//!
//! ```toml
//! # Address the server listens on
//! listen = "127.0.0.1:2323"
//!
//! # Raw read size and filtered queue size, in bytes
//! raw_chunk_size = 1024
//! queue_capacity = 65536
//!
//! # tracing filter (overridden by RUST_LOG) and optional log file
//! log_level = "info"
//! log_file = "/tmp/tnfilter.log"
//!
//! [handshake]
//! echo_off = true
//! line_mode = true
//! window_size = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::filter::FilterOptions;
use crate::core::handshake::HandshakeOptions;
use crate::core::session::SessionOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config: {0}")]
    Write(#[source] std::io::Error),

    #[error("Could not determine config path")]
    NoHome,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address
    pub listen: String,
    /// Largest single raw read
    pub raw_chunk_size: usize,
    /// Filtered byte queue capacity
    pub queue_capacity: usize,
    /// Default tracing filter
    pub log_level: String,
    /// Log to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Option requests sent on connect
    pub handshake: HandshakeOptions,
}

impl Default for Config {
    fn default() -> Self {
        let filter = FilterOptions::default();
        Self {
            listen: "127.0.0.1:2323".to_string(),
            raw_chunk_size: filter.raw_chunk_size,
            queue_capacity: filter.queue_capacity,
            log_level: "info".to_string(),
            log_file: None,
            handshake: HandshakeOptions::default(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file is missing
    pub fn load() -> Result<Self, ConfigError> {
        match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }
        fs::write(path, content).map_err(ConfigError::Write)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::get_config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".tnfilter").join("config.toml"))
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            raw_chunk_size: self.raw_chunk_size,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            filter: self.filter_options(),
            handshake: self.handshake,
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
