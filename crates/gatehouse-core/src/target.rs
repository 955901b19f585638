//! The target model.
//!
//! A target is a configured upstream endpoint: either a stdio-launched MCP
//! connector subprocess or a remote A2A HTTPS agent. The gateway treats
//! target ids as opaque strings and target config blobs as opaque JSON —
//! both are interpreted only by the upstream adapters.

use serde::{Deserialize, Serialize};

/// Unique identifier of a configured target. Opaque to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Wrap a string as a target id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What kind of upstream a target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A stdio-launched MCP subprocess.
    Connector,
    /// A remote A2A HTTPS agent.
    Agent,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connector => write!(f, "connector"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// The wire dialect a target speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProtocol {
    /// MCP JSON-RPC over subprocess stdio.
    Mcp,
    /// A2A JSON-RPC over HTTPS.
    A2a,
}

impl std::fmt::Display for TargetProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mcp => write!(f, "mcp"),
            Self::A2a => write!(f, "a2a"),
        }
    }
}

/// A configured upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique identifier, opaque to the gateway.
    pub id: TargetId,

    /// Connector or agent.
    pub kind: TargetKind,

    /// Whether requests may be dispatched to this target.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Adapter-specific configuration (command + args for connectors,
    /// URL for agents). Never interpreted by the gateway core.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl Target {
    /// Create an enabled target with an empty config blob.
    #[must_use]
    pub fn new(id: impl Into<TargetId>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
            config: serde_json::Value::Null,
        }
    }

    /// Attach an adapter config blob.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Mark the target disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The protocol this target speaks. Derived from the kind, so the
    /// connector-speaks-MCP / agent-speaks-A2A pairing cannot be violated.
    #[must_use]
    pub fn protocol(&self) -> TargetProtocol {
        match self.kind {
            TargetKind::Connector => TargetProtocol::Mcp,
            TargetKind::Agent => TargetProtocol::A2a,
        }
    }
}
