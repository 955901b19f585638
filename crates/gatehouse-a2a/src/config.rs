//! Agent endpoint configuration.

use gatehouse_core::Target;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{A2aError, A2aResult};

/// Typed view of an agent target's opaque config blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// JSON-RPC endpoint of the agent.
    pub url: String,

    /// Extra headers attached to every call (e.g. an upstream API key).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl AgentConfig {
    /// Extract and validate the agent config from a target.
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::Config`] when the blob does not deserialize
    /// or the URL is not http(s).
    pub fn from_target(target: &Target) -> A2aResult<Self> {
        let config: Self =
            serde_json::from_value(target.config.clone()).map_err(|e| A2aError::Config {
                target: target.id.to_string(),
                message: e.to_string(),
            })?;

        let parsed = reqwest::Url::parse(&config.url).map_err(|e| A2aError::Config {
            target: target.id.to_string(),
            message: format!("bad url: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(A2aError::Config {
                target: target.id.to_string(),
                message: format!("unsupported url scheme '{}'", parsed.scheme()),
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::TargetKind;
    use serde_json::json;

    #[test]
    fn test_from_target() {
        let target = Target::new("agent-7", TargetKind::Agent).with_config(json!({
            "url": "https://agents.example.com/a2a",
            "headers": {"x-api-key": "k"},
        }));
        let config = AgentConfig::from_target(&target).unwrap();
        assert_eq!(config.url, "https://agents.example.com/a2a");
        assert_eq!(config.headers.get("x-api-key").unwrap(), "k");
    }

    #[test]
    fn test_rejects_missing_url() {
        let target = Target::new("agent-7", TargetKind::Agent).with_config(json!({}));
        assert!(matches!(
            AgentConfig::from_target(&target),
            Err(A2aError::Config { .. })
        ));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let target =
            Target::new("agent-7", TargetKind::Agent).with_config(json!({"url": "ftp://x"}));
        assert!(matches!(
            AgentConfig::from_target(&target),
            Err(A2aError::Config { .. })
        ));
    }
}
