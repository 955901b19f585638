//! Connector registry: one live client per connector target.

use dashmap::DashMap;
use gatehouse_core::{Target, TargetId};
use std::sync::Arc;

use crate::client::McpClient;
use crate::config::ConnectorConfig;
use crate::error::McpResult;

/// Lazily-spawned, reusable connector clients keyed by target id.
#[derive(Debug, Default)]
pub struct McpRegistry {
    clients: DashMap<TargetId, Arc<McpClient>>,
}

impl McpRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live client for a target, spawning it on first use.
    ///
    /// Calls for one target are serialized by the admission queue, so
    /// concurrent spawns of the same connector are not a practical
    /// concern; if one slips through anyway the loser is dropped, which
    /// kills its child.
    ///
    /// # Errors
    ///
    /// Propagates config, spawn, and handshake errors from
    /// [`McpClient::spawn`].
    pub async fn get_or_spawn(&self, target: &Target) -> McpResult<Arc<McpClient>> {
        if let Some(existing) = self.clients.get(&target.id) {
            return Ok(Arc::clone(existing.value()));
        }

        let config = ConnectorConfig::from_target(target)?;
        let client = Arc::new(McpClient::spawn(&target.id, &config).await?);

        let entry = self
            .clients
            .entry(target.id.clone())
            .or_insert_with(|| Arc::clone(&client));
        Ok(Arc::clone(entry.value()))
    }

    /// Drop a target's client, killing its child. Used when a connector
    /// misbehaves and should be respawned on the next request.
    pub fn evict(&self, target: &TargetId) {
        self.clients.remove(target);
    }

    /// Number of live connector clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether any connector is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Shut every connector down and forget them.
    pub fn shutdown_all(&self) {
        for entry in self.clients.iter() {
            entry.value().shutdown();
        }
        self.clients.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::TargetKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_bad_config_does_not_register() {
        let registry = McpRegistry::new();
        let target = Target::new("broken", TargetKind::Connector).with_config(json!({}));
        assert!(registry.get_or_spawn(&target).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_does_not_register() {
        let registry = McpRegistry::new();
        let target = Target::new("ghost", TargetKind::Connector)
            .with_config(json!({"command": "/definitely/not/a/binary"}));
        assert!(registry.get_or_spawn(&target).await.is_err());
        assert!(registry.is_empty());
        // Eviction of an absent target is a no-op.
        registry.evict(&TargetId::new("ghost"));
    }
}
