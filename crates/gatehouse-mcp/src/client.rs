//! A managed MCP connector subprocess.

use gatehouse_core::{TargetId, UpstreamOutcome};
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::config::ConnectorConfig;
use crate::error::{McpError, McpResult};
use crate::transport::JsonRpcPeer;

/// MCP protocol revision sent in the `initialize` request.
const PROTOCOL_VERSION: &str = "2025-06-18";

/// A spawned connector child plus its JSON-RPC transport.
///
/// The child is started with piped stdio and `kill_on_drop`; dropping or
/// shutting down the client tears the process down.
#[derive(Debug)]
pub struct McpClient {
    target: TargetId,
    peer: JsonRpcPeer,
    child: Mutex<Option<Child>>,
}

impl McpClient {
    /// Spawn the connector process and complete the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Spawn`] when the process cannot start,
    /// [`McpError::Handshake`] when `initialize` fails or times out, and
    /// transport errors for broken pipes in between.
    pub async fn spawn(target: &TargetId, config: &ConnectorConfig) -> McpResult<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| McpError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("child stdout unavailable".to_owned()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child stdin unavailable".to_owned()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, target.clone()));
        }

        let client = Self {
            target: target.clone(),
            peer: JsonRpcPeer::new(stdout, stdin, target.to_string()),
            child: Mutex::new(Some(child)),
        };
        client.initialize(config).await?;

        tracing::info!(connector = %client.target, command = %config.command, "connector ready");
        Ok(client)
    }

    #[cfg(test)]
    fn from_peer(target: &TargetId, peer: JsonRpcPeer) -> Self {
        Self {
            target: target.clone(),
            peer,
            child: Mutex::new(None),
        }
    }

    async fn initialize(&self, config: &ConnectorConfig) -> McpResult<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": "gatehouse",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {},
        });

        let cancel_token = CancellationToken::new();
        let handshake = self
            .peer
            .request("initialize", Some(params), &cancel_token);
        let outcome = tokio::time::timeout(
            Duration::from_millis(config.startup_timeout_ms),
            handshake,
        )
        .await
        .map_err(|_| McpError::Handshake("timed out waiting for initialize".to_owned()))?
        .map_err(|e| McpError::Handshake(e.to_string()))?;

        match outcome {
            UpstreamOutcome::Result(_) => {
                self.peer.notify("notifications/initialized", None).await?;
                Ok(())
            }
            UpstreamOutcome::Error { code, message } => Err(McpError::Handshake(format!(
                "initialize rejected with {code}: {message}"
            ))),
        }
    }

    /// Forward one call to the connector.
    ///
    /// `notifications/*` methods are fire-and-forget: they resolve with a
    /// null result as soon as the frame is written.
    ///
    /// # Errors
    ///
    /// Transport-level failures only; a JSON-RPC error response arrives
    /// as [`UpstreamOutcome::Error`].
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> McpResult<UpstreamOutcome> {
        if method.starts_with("notifications/") {
            self.peer.notify(method, params).await?;
            return Ok(UpstreamOutcome::Result(Value::Null));
        }
        self.peer.request(method, params, cancel).await
    }

    /// Close the transport and kill the child.
    pub fn shutdown(&self) {
        self.peer.close();
        if let Ok(mut slot) = self.child.lock() {
            if let Some(child) = slot.as_mut() {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(connector = %self.target, error = %e, "connector already gone");
                }
            }
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_stderr(stderr: tokio::process::ChildStderr, target: TargetId) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(connector = %target, "connector stderr: {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn test_spawn_failure_names_the_command() {
        let target = TargetId::new("ghost");
        let config = ConnectorConfig {
            command: "/definitely/not/a/binary".to_owned(),
            args: Vec::new(),
            env: std::collections::BTreeMap::new(),
            cwd: None,
            startup_timeout_ms: 1000,
        };
        let err = McpClient::spawn(&target, &config).await.unwrap_err();
        assert!(
            matches!(err, McpError::Spawn { ref command, .. } if command == "/definitely/not/a/binary")
        );
    }

    #[tokio::test]
    async fn test_notification_methods_short_circuit() {
        let (client_io, server_io) = duplex(16 * 1024);
        let (read_half, write_half) = tokio::io::split(client_io);
        let target = TargetId::new("t");
        let client = McpClient::from_peer(&target, JsonRpcPeer::new(read_half, write_half, "t"));

        // No server response is needed for a notification.
        let outcome = client
            .call(
                "notifications/initialized",
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpstreamOutcome::Result(Value::Null));
        drop(server_io);
    }

    #[tokio::test]
    async fn test_call_round_trips_through_peer() {
        let (client_io, server_io) = duplex(16 * 1024);
        let (read_half, write_half) = tokio::io::split(client_io);
        let target = TargetId::new("t");
        let client = McpClient::from_peer(&target, JsonRpcPeer::new(read_half, write_half, "t"));

        tokio::spawn(async move {
            let (srv_read, mut srv_write) = tokio::io::split(server_io);
            let mut lines = BufReader::new(srv_read).lines();
            let req: Value =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            let mut reply = json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": {"tools": []},
            })
            .to_string();
            reply.push('\n');
            srv_write.write_all(reply.as_bytes()).await.unwrap();
        });

        let outcome = client
            .call("tools/list", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, UpstreamOutcome::Result(json!({"tools": []})));
    }
}
