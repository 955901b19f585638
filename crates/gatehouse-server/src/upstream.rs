//! The seam between proxy handlers and upstream adapters.
//!
//! Handlers depend on [`ProxyUpstream`] only, so tests can substitute
//! scripted upstreams and the queue engine stays protocol-agnostic.

use async_trait::async_trait;
use gatehouse_a2a::{A2aClient, A2aError};
use gatehouse_core::{Target, UpstreamOutcome};
use gatehouse_mcp::{McpError, McpRegistry};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Transport-level upstream failure, from either dialect.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Failure in the stdio connector adapter.
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// Failure in the HTTPS agent adapter.
    #[error(transparent)]
    A2a(#[from] A2aError),
}

impl UpstreamError {
    /// Whether this failure was the caller's cancellation token firing
    /// rather than the upstream misbehaving.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Mcp(McpError::Cancelled) | Self::A2a(A2aError::Cancelled)
        )
    }
}

/// "Call upstream, return an outcome, honor the cancellation signal."
///
/// The contract the queue engine relies on: implementations return
/// eventually once `cancel` fires, and a JSON-RPC error from the
/// upstream is an *outcome*, not an `Err`.
#[async_trait]
pub trait ProxyUpstream: Send + Sync {
    /// Perform one upstream call for `target`.
    async fn call(
        &self,
        target: &Target,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<UpstreamOutcome, UpstreamError>;
}

/// The stdio connector upstream: a registry of lazily-spawned children.
#[derive(Debug, Default)]
pub struct McpProxy {
    registry: McpRegistry,
}

impl McpProxy {
    /// Create an empty proxy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill every spawned connector.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }
}

#[async_trait]
impl ProxyUpstream for McpProxy {
    async fn call(
        &self,
        target: &Target,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<UpstreamOutcome, UpstreamError> {
        let client = self.registry.get_or_spawn(target).await?;
        Ok(client.call(method, params, &cancel).await?)
    }
}

/// The HTTPS agent upstream.
#[derive(Debug)]
pub struct A2aProxy {
    client: A2aClient,
}

impl A2aProxy {
    /// Create the proxy with a fresh HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::Client`] when the TLS backend cannot start.
    pub fn new() -> Result<Self, A2aError> {
        Ok(Self {
            client: A2aClient::new()?,
        })
    }
}

#[async_trait]
impl ProxyUpstream for A2aProxy {
    async fn call(
        &self,
        target: &Target,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<UpstreamOutcome, UpstreamError> {
        Ok(self.client.call(target, method, params, &cancel).await?)
    }
}
