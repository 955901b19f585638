//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gatehouse_auth::AuthGate;
use gatehouse_config::{AuthMode, AuthSettings, TokenEntry};
use gatehouse_core::{Target, UpstreamOutcome};
use gatehouse_mcp::McpError;
use gatehouse_queue::{QueueEngine, QueueLimits};
use gatehouse_server::{AppState, ProxyUpstream, UpstreamError, build_router};
use gatehouse_telemetry::{EventLog, LogLevel};
use http::HeaderMap;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// sha256("correct-horse"), as configured token hashes are written.
pub const CORRECT_HORSE_HASH: &str =
    "sha256:9dca666eb54730714630d1519264a7bf1eeaad00b8f2edc90d3ecbfad928d163";

/// An event-log sink tests can read back.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn lines(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8(buf.clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    pub fn events(&self, name: &str) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|l| l["event"] == name)
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type RespondFn =
    Arc<dyn Fn(&Target, &str, Option<Value>) -> Result<UpstreamOutcome, UpstreamError> + Send + Sync>;

/// A scripted upstream: optional delay, then a canned response.
#[derive(Clone)]
pub struct StubUpstream {
    pub delay: Duration,
    pub respond: RespondFn,
    /// Set when a call observed its cancellation token fire.
    pub cancelled: Arc<AtomicBool>,
}

impl StubUpstream {
    pub fn ok(result: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            respond: Arc::new(move |_, _, _| Ok(UpstreamOutcome::Result(result.clone()))),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Echoes the method and params back as the result.
    pub fn echo() -> Self {
        Self {
            delay: Duration::ZERO,
            respond: Arc::new(|_, method, params| {
                Ok(UpstreamOutcome::Result(serde_json::json!({
                    "method": method,
                    "params": params,
                })))
            }),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn rpc_error(code: i64, message: &str) -> Self {
        let message = message.to_owned();
        Self {
            delay: Duration::ZERO,
            respond: Arc::new(move |_, _, _| {
                Ok(UpstreamOutcome::Error {
                    code,
                    message: message.clone(),
                })
            }),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn transport_failure(message: &str) -> Self {
        let message = message.to_owned();
        Self {
            delay: Duration::ZERO,
            respond: Arc::new(move |_, _, _| {
                Err(UpstreamError::Mcp(McpError::Transport(message.clone())))
            }),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ProxyUpstream for StubUpstream {
    async fn call(
        &self,
        target: &Target,
        method: &str,
        params: Option<Value>,
        cancel: CancellationToken,
    ) -> Result<UpstreamOutcome, UpstreamError> {
        if !self.delay.is_zero() {
            // Watch the token from a separate task: the engine may drop
            // this call future on shutdown before it gets polled again.
            let flag = Arc::clone(&self.cancelled);
            let watched = cancel.clone();
            let watcher = tokio::spawn(async move {
                watched.cancelled().await;
                flag.store(true, Ordering::SeqCst);
            });
            tokio::select! {
                () = cancel.cancelled() => {
                    self.cancelled.store(true, Ordering::SeqCst);
                    return Err(UpstreamError::Mcp(McpError::Cancelled));
                }
                () = tokio::time::sleep(self.delay) => { watcher.abort(); }
            }
        }
        (self.respond)(target, method, params)
    }
}

/// Everything a router test needs to vary.
pub struct Fixture {
    pub targets: Vec<Target>,
    pub auth: AuthSettings,
    pub hide_not_found: bool,
    pub timeout_ms: u64,
    pub max_queue: usize,
    pub upstream: StubUpstream,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            auth: AuthSettings::default(),
            hide_not_found: true,
            timeout_ms: 30_000,
            max_queue: 10,
            upstream: StubUpstream::ok(Value::Null),
        }
    }
}

impl Fixture {
    pub fn build(self) -> (Router, SharedBuf) {
        let buf = SharedBuf::default();
        let upstream: Arc<dyn ProxyUpstream> = Arc::new(self.upstream);
        let state = Arc::new(AppState {
            hide_not_found: self.hide_not_found,
            targets: self
                .targets
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect::<HashMap<_, _>>(),
            gate: AuthGate::from_settings(&self.auth).unwrap(),
            engine: QueueEngine::new(QueueLimits {
                timeout: Duration::from_millis(self.timeout_ms),
                max_queue: self.max_queue,
                max_inflight: 1,
            }),
            mcp: Arc::clone(&upstream),
            a2a: upstream,
            events: Arc::new(EventLog::new(LogLevel::Info, buf.clone())),
        });
        (build_router(state, 1024 * 1024), buf)
    }
}

/// Bearer settings with one `ci` token holding the given permissions.
pub fn ci_token(permissions: &[&str]) -> AuthSettings {
    AuthSettings {
        mode: AuthMode::Bearer,
        tokens: vec![TokenEntry {
            name: "ci".to_owned(),
            hash: CORRECT_HORSE_HASH.to_owned(),
            permissions: permissions.iter().map(|s| (*s).to_owned()).collect(),
        }],
    }
}

/// POST a JSON body and collect the response.
pub async fn post_json(
    router: Router,
    path: &str,
    body: Value,
    bearer: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = request.body(Body::from(body.to_string())).unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, value)
}

/// GET a path and collect the response.
pub async fn get_path(router: Router, path: &str) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}

/// Assert the standard error body shape and return the request id.
pub fn assert_error_body(body: &Value, code: &str) -> String {
    assert_eq!(body["error"]["code"], code, "body: {body}");
    let request_id = body["error"]["request_id"].as_str().expect("request_id");
    assert!(
        gatehouse_core::RequestId::timestamp_of(request_id).is_some(),
        "request_id '{request_id}' is not a valid id"
    );
    request_id.to_owned()
}
