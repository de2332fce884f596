//! Configuration module for Brook
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BrookError, Result};

/// Default number of shards for the stream and channel registries
pub const DEFAULT_SHARD_AMOUNT: usize = 64;

/// Main configuration structure for Brook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stream engine configuration
    pub streams: StreamsConfig,

    /// Pub/sub broker configuration
    pub pubsub: PubSubConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BrookError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| BrookError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.streams.validate()?;
        self.pubsub.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Write configuration to a TOML file
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| BrookError::Config(format!("Failed to serialize config: {}", e)))?;

        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml_str)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn validate_shard_amount(section: &str, shard_amount: usize) -> Result<()> {
    if shard_amount < 2 || !shard_amount.is_power_of_two() {
        return Err(BrookError::Config(format!(
            "{section}.shard_amount must be a power of two greater than 1, got {shard_amount}"
        )));
    }
    Ok(())
}

/// Stream engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    /// Trim bound applied to appends that do not pass their own (None = unbounded)
    pub default_max_len: Option<usize>,

    /// Number of shards in the key registry
    pub shard_amount: usize,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            default_max_len: None,
            shard_amount: DEFAULT_SHARD_AMOUNT,
        }
    }
}

impl StreamsConfig {
    /// Validate the stream settings
    pub fn validate(&self) -> Result<()> {
        validate_shard_amount("streams", self.shard_amount)
    }
}

/// Pub/sub broker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Number of shards in the channel registry
    pub shard_amount: usize,

    /// Name prefix for handler worker threads
    pub worker_thread_name: String,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            shard_amount: DEFAULT_SHARD_AMOUNT,
            worker_thread_name: "brook-sub".to_string(),
        }
    }
}

impl PubSubConfig {
    /// Validate the broker settings
    pub fn validate(&self) -> Result<()> {
        validate_shard_amount("pubsub", self.shard_amount)?;
        if self.worker_thread_name.is_empty() {
            return Err(BrookError::Config(
                "pubsub.worker_thread_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter directive, e.g. `info` or `brook=debug,warn`
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Validate the log filter.
    ///
    /// Only checks that a directive is present. The directive syntax is
    /// checked when the filter is built, see `brook::telemetry`.
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(BrookError::Config("Log level must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}
