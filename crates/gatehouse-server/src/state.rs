//! Shared application state.

use gatehouse_auth::AuthGate;
use gatehouse_core::{Target, TargetId, UpstreamOutcome};
use gatehouse_queue::QueueEngine;
use gatehouse_telemetry::EventLog;
use std::collections::HashMap;
use std::sync::Arc;

use crate::upstream::{ProxyUpstream, UpstreamError};

/// Everything the handlers and middleware share.
///
/// Built once at startup from the validated config; immutable afterward
/// apart from the queue engine's own interior state.
pub struct AppState {
    /// Whether missing targets are reported as 403 instead of 404.
    pub hide_not_found: bool,

    /// Configured targets, keyed by id.
    pub targets: HashMap<TargetId, Target>,

    /// The authentication gate.
    pub gate: AuthGate,

    /// The per-target admission queue.
    pub engine: QueueEngine<UpstreamOutcome, UpstreamError>,

    /// Upstream adapter for MCP connector targets.
    pub mcp: Arc<dyn ProxyUpstream>,

    /// Upstream adapter for A2A agent targets.
    pub a2a: Arc<dyn ProxyUpstream>,

    /// The request event log.
    pub events: Arc<EventLog>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("hide_not_found", &self.hide_not_found)
            .field("targets", &self.targets.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Look a target up by id.
    #[must_use]
    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.targets.get(id)
    }
}
