//! Newline-delimited JSON-RPC framing over a byte stream pair.

use gatehouse_core::{JsonRpcRequest, JsonRpcResponse, UpstreamOutcome};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{McpError, McpResult};

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcResponse>>;

/// `None` once the transport has closed; inserts then fail fast.
type SharedPending = Arc<Mutex<Option<PendingMap>>>;

/// Removes a pending entry if the caller gives up before the response
/// arrives (cancellation, or the whole call future being dropped).
struct PendingGuard {
    pending: SharedPending,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.pending.lock() {
            if let Some(map) = slot.as_mut() {
                map.remove(&self.id);
            }
        }
    }
}

/// One side of a JSON-RPC 2.0 conversation over newline-delimited JSON.
///
/// A background reader task demuxes responses into per-request channels;
/// inbound notifications are logged and dropped — the gateway only
/// forwards request/response traffic.
pub struct JsonRpcPeer {
    label: String,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: SharedPending,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl std::fmt::Debug for JsonRpcPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcPeer")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl JsonRpcPeer {
    /// Start a peer over a reader/writer pair. `label` names the remote
    /// side in diagnostics (the target id, in practice).
    #[must_use]
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        label: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let pending: SharedPending = Arc::new(Mutex::new(Some(HashMap::new())));

        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&pending), label.clone()));

        Self {
            label,
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
        }
    }

    /// Send a request and await the matching response or cancellation.
    ///
    /// # Errors
    ///
    /// - [`McpError::Cancelled`] when `cancel` fires first.
    /// - [`McpError::ChannelClosed`] when the peer goes away mid-call.
    /// - [`McpError::Transport`] when the write fails.
    /// - [`McpError::Serialization`] when the frame cannot be encoded.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> McpResult<UpstreamOutcome> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut slot = self.pending.lock().map_err(poisoned)?;
            let map = slot.as_mut().ok_or(McpError::ChannelClosed)?;
            map.insert(id, tx);
        }
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        };

        self.write_frame(&JsonRpcRequest::new(id, method, params))
            .await?;

        tokio::select! {
            () = cancel.cancelled() => Err(McpError::Cancelled),
            response = rx => match response {
                Ok(resp) => Ok(resp.into_outcome()),
                Err(_) => Err(McpError::ChannelClosed),
            },
        }
    }

    /// Send a fire-and-forget notification.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] or [`McpError::Serialization`].
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.write_frame(&JsonRpcRequest::notification(method, params))
            .await
    }

    async fn write_frame(&self, request: &JsonRpcRequest) -> McpResult<()> {
        let mut frame = serde_json::to_string(request)?;
        frame.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    /// Tear the transport down: stop the reader and fail every pending
    /// call with [`McpError::ChannelClosed`].
    pub fn close(&self) {
        self.reader_task.abort();
        if let Ok(mut slot) = self.pending.lock() {
            // Dropping the senders wakes every waiting request.
            slot.take();
        }
    }
}

impl Drop for JsonRpcPeer {
    fn drop(&mut self) {
        self.close();
    }
}

fn poisoned<T>(_: T) -> McpError {
    McpError::Transport("pending map poisoned".to_owned())
}

async fn read_loop(
    reader: impl AsyncRead + Send + Unpin + 'static,
    pending: SharedPending,
    label: String,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                dispatch_line(&line, &pending, &label);
            }
            Ok(None) => {
                tracing::debug!(connector = %label, "connector closed stdout");
                break;
            }
            Err(e) => {
                tracing::warn!(connector = %label, error = %e, "connector read failed");
                break;
            }
        }
    }

    // EOF or error: every pending call learns the peer is gone.
    if let Ok(mut slot) = pending.lock() {
        slot.take();
    }
}

fn dispatch_line(line: &str, pending: &SharedPending, label: &str) {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(connector = %label, error = %e, "discarding unparsable frame");
            return;
        }
    };

    // Frames with a method are server-initiated requests/notifications;
    // the gateway does not service them.
    if value.get("method").is_some() {
        tracing::debug!(
            connector = %label,
            method = %value["method"],
            "ignoring server-initiated frame"
        );
        return;
    }

    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        tracing::warn!(connector = %label, "discarding response without usable id");
        return;
    };

    let response: JsonRpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(connector = %label, error = %e, "discarding malformed response");
            return;
        }
    };

    let sender = pending
        .lock()
        .ok()
        .and_then(|mut slot| slot.as_mut().and_then(|map| map.remove(&id)));

    match sender {
        // The caller may have timed out and gone; that is fine.
        Some(tx) => {
            let _ = tx.send(response);
        }
        None => {
            tracing::debug!(connector = %label, id, "response for unknown or abandoned request");
        }
    }
}
