//! Request-scoped identity, authentication, and the access log.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gatehouse_auth::AuthError;
use gatehouse_core::{ErrorCode, RequestId};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;

use crate::response::{ApiError, ClientId, LogContext};
use crate::state::AppState;

/// Outermost middleware: assign the request id, time the request, and
/// emit one `http_request` event when the response is ready.
pub(crate) async fn observe(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::generate();
    let method = request.method().clone();
    let uri = request.uri().clone();
    request.extensions_mut().insert(request_id.clone());

    let started = Instant::now();
    let response = next.run(request).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let mut fields = serde_json::Map::new();
    fields.insert("request_id".to_owned(), json!(request_id.as_str()));
    fields.insert("method".to_owned(), json!(method.as_str()));
    fields.insert("url".to_owned(), json!(uri.to_string()));
    fields.insert("status".to_owned(), json!(response.status().as_u16()));
    fields.insert("latency_ms".to_owned(), json!(latency_ms));

    if let Some(client) = response.extensions().get::<ClientId>() {
        fields.insert("client_id".to_owned(), json!(client.0));
    }
    if let Some(ctx) = response.extensions().get::<LogContext>() {
        if let Some(target) = &ctx.target_id {
            fields.insert("target_id".to_owned(), json!(target));
        }
        if let Some(decision) = ctx.decision {
            fields.insert("decision".to_owned(), json!(decision));
        }
        if let Some(wait) = ctx.queue_wait_ms {
            fields.insert("queue_wait_ms".to_owned(), json!(wait));
        }
        if let Some(upstream) = ctx.upstream_latency_ms {
            fields.insert("upstream_latency_ms".to_owned(), json!(upstream));
        }
    }

    state
        .events
        .info("http_request", serde_json::Value::Object(fields));
    response
}

/// Authentication gate. Attaches [`AuthInfo`](gatehouse_auth::AuthInfo)
/// to the request on success and answers 401 itself on failure. The
/// presented token is hashed inside the gate and never stored.
pub(crate) async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(RequestId::generate);

    let authorization = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.gate.authenticate(request.uri().path(), authorization) {
        Ok(info) => {
            let client_id = info.client_id.clone();
            request.extensions_mut().insert(info);
            let mut response = next.run(request).await;
            response.extensions_mut().insert(ClientId(client_id));
            response
        }
        Err(AuthError::Unauthorized) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "missing or malformed Authorization header",
            request_id,
        )
        .with_decision("deny")
        .into_response(),
        Err(AuthError::InvalidToken) => ApiError::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidToken,
            "invalid token",
            request_id,
        )
        .with_decision("deny")
        .into_response(),
        // Malformed hashes are rejected at startup; reaching this means
        // the gate was built outside the normal path.
        Err(AuthError::MalformedHash { .. }) => ApiError::internal(request_id).into_response(),
    }
}
