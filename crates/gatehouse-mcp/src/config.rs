//! Connector launch configuration.

use gatehouse_core::Target;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{McpError, McpResult};

fn default_startup_timeout_ms() -> u64 {
    10_000
}

/// How to launch one MCP connector subprocess.
///
/// This is the typed view of a connector target's opaque config blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Executable to run.
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory for the child.
    #[serde(default)]
    pub cwd: Option<String>,

    /// How long the `initialize` exchange may take before the spawn is
    /// declared failed.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

impl ConnectorConfig {
    /// Extract and validate the connector config from a target.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Config`] when the blob does not deserialize
    /// or names an empty command.
    pub fn from_target(target: &Target) -> McpResult<Self> {
        let config: Self =
            serde_json::from_value(target.config.clone()).map_err(|e| McpError::Config {
                target: target.id.to_string(),
                message: e.to_string(),
            })?;
        if config.command.trim().is_empty() {
            return Err(McpError::Config {
                target: target.id.to_string(),
                message: "command must not be empty".to_owned(),
            });
        }
        Ok(config)
    }
}
