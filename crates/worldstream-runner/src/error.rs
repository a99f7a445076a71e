//! Error types for the demo runner binary.

use worldstream_core::ConfigError;

/// Errors that abort the runner at startup.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
