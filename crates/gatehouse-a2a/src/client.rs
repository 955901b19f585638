//! The A2A HTTP client.

use gatehouse_core::{JsonRpcRequest, JsonRpcResponse, Target, UpstreamOutcome};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::error::{A2aError, A2aResult};

/// One shared HTTP client for all agent targets.
///
/// Connection pooling lives in `reqwest`; per-target state is nothing
/// but the URL and headers read from the target config on each call.
#[derive(Debug)]
pub struct A2aClient {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl A2aClient {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::Client`] when the TLS backend cannot be
    /// initialized.
    pub fn new() -> A2aResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .use_rustls_tls()
            .build()
            .map_err(|e| A2aError::Client(e.to_string()))?;
        Ok(Self {
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// POST one JSON-RPC call to the agent named by `target`.
    ///
    /// The overall deadline is enforced by the admission queue; this
    /// method only aborts early when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Transport-level failures only; a JSON-RPC error response arrives
    /// as [`UpstreamOutcome::Error`].
    pub async fn call(
        &self,
        target: &Target,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> A2aResult<UpstreamOutcome> {
        let config = AgentConfig::from_target(target)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = JsonRpcRequest::new(id, method, params);
        tracing::debug!(agent = %target.id, method, "forwarding call");

        let mut request = self.http.post(&config.url).json(&envelope);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| A2aError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(A2aError::HttpStatus {
                    status: status.as_u16(),
                });
            }

            let body: JsonRpcResponse = response
                .json()
                .await
                .map_err(|e| A2aError::MalformedResponse(e.to_string()))?;
            Ok(body.into_outcome())
        };

        tokio::select! {
            () = cancel.cancelled() => Err(A2aError::Cancelled),
            outcome = exchange => outcome,
        }
    }
}
