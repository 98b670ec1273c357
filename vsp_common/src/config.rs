//! Configuration loading.
//!
//! The orchestrator reads a flat `key=value` file once at startup:
//!
//! ```text
//! # child processes
//! gps.path = /usr/bin/gps_monitor
//! gps.args = --device /dev/ttyS1
//! orchestrator.manual_start = true
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use vsp_common::config::{ConfigError, KeyValueConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = KeyValueConfig::load(Path::new("/etc/vsp/vsp.conf"))?;
//!     let refresh: u64 = config.get_or("orchestrator.gui_refresh_ms", 1000)?;
//!     println!("GUI refresh: {refresh} ms");
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// A line could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A value does not have the expected form.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Equivalent `tracing` level.
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log level '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Flat string map loaded from a `key=value` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueConfig {
    entries: HashMap<String, String>,
}

impl KeyValueConfig {
    /// Load and parse a configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::FileNotFound` if the file does not exist
    /// - `ConfigError::ParseError` if the file is unreadable or a line has no `=`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        content.parse()
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of `key` parsed as `T`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the value does not parse.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    ConfigError::ValidationError(format!("invalid value '{raw}' for key '{key}'"))
                })
            })
            .transpose()
    }

    /// Value of `key` parsed as `T`, or `default` if absent.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    /// Insert or replace one entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the configuration holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for KeyValueConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let mut entries = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::ParseError(format!("line {}: expected key=value", idx + 1))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::ParseError(format!("line {}: empty key", idx + 1)));
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { entries })
    }
}

/// Parse a System V queue key given in decimal or `0x`-prefixed hex.
pub fn parse_queue_key(s: &str) -> Result<i32, ConfigError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32),
        None => s.parse::<i32>(),
    };
    parsed.map_err(|e| ConfigError::ValidationError(format!("invalid queue key '{s}': {e}")))
}
