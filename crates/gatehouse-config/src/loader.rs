//! Config file loading.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::types::GatewayConfig;
use crate::validate::validate;

impl GatewayConfig {
    /// Load and validate a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid TOML for this shape, and
    /// [`ConfigError::Validation`] for any out-of-range field.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`].
    pub fn from_toml(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        validate(&config)?;
        Ok(config)
    }

    /// The effective request body cap in bytes, clamped to the 100 MiB
    /// ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `max_body_size` does not
    /// match the accepted grammar. Cannot fail on a validated config.
    pub fn body_limit_bytes(&self) -> ConfigResult<u64> {
        crate::validate::parse_body_size(&self.max_body_size)
    }
}
