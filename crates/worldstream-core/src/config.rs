//! Configuration loading and typed config structures for the streamer.
//!
//! The canonical configuration lives in `worldstream-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level streamer configuration.
///
/// Mirrors the structure of `worldstream-config.yaml`. All fields have
/// sensible defaults so an absent or partial file still yields a working
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamerConfig {
    /// World-level settings.
    #[serde(default)]
    pub world: WorldConfig,

    /// Streaming and reconciliation settings.
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StreamerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yml::from_str(&contents)?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
        }
    }
}

/// Streaming and reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamingConfig {
    /// Whether parcels with no published scene are assigned a synthetic
    /// placeholder scene id instead of resolving to nothing.
    #[serde(default = "default_true")]
    pub empty_parcels_enabled: bool,

    /// Render distance in parcels around the observer.
    #[serde(default = "default_render_distance")]
    pub render_distance: u32,

    /// Capacity of the scene event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            empty_parcels_enabled: true,
            render_distance: default_render_distance(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Worldstream".to_owned()
}

const fn default_render_distance() -> u32 {
    4
}

const fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
