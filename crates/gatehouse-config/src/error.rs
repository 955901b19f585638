//! Configuration error types.

use std::path::PathBuf;

/// Errors from loading or validating gateway configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected shape.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed validation.
    #[error("invalid config field '{field}': {message}")]
    Validation {
        /// Dotted path of the offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Shorthand for a validation failure.
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
