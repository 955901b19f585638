//! The proxy handlers: body validation, permission checks, target
//! resolution, queue dispatch, and outcome-to-status translation.

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use gatehouse_auth::{AuthInfo, a2a_kind, a2a_required, has_permission, mcp_required};
use gatehouse_core::{ErrorCode, RequestId, Target, TargetId, TargetKind, UpstreamOutcome, rpc_code};
use gatehouse_queue::{Completion, QueueError};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::response::{ApiError, success_response};
use crate::state::AppState;
use crate::upstream::UpstreamError;

/// MCP dialect methods the gateway forwards. Anything under
/// `notifications/` is also accepted and forwarded fire-and-forget.
const MCP_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
    "prompts/list",
    "prompts/get",
];

fn is_accepted_mcp_method(method: &str) -> bool {
    MCP_METHODS.contains(&method) || method.starts_with("notifications/")
}

/// `GET /health`: public liveness probe. No auth, no queue involvement.
pub(crate) async fn health() -> Response {
    let body = json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    let mut response = (StatusCode::OK, Json(body)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response
}

/// A body that could not be buffered: over the cap (413) or cut off
/// mid-read. Keeps the rejection's status but the standard body shape.
fn body_rejection(rejection: &BytesRejection, request_id: RequestId) -> Response {
    ApiError::new(
        rejection.status(),
        ErrorCode::BadRequest,
        rejection.body_text(),
        request_id,
    )
    .into_response()
}

/// Catch-all for unknown paths, in the standard error body shape.
pub(crate) async fn fallback(Extension(request_id): Extension<RequestId>) -> Response {
    ApiError::not_found("no such endpoint", request_id).into_response()
}

/// `POST /mcp/v1/message`: forward one MCP call to a connector.
pub(crate) async fn mcp_proxy(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(auth): Extension<AuthInfo>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(bytes) => bytes,
        Err(rejection) => return body_rejection(&rejection, request_id),
    };
    let (connector, method, params) = match parse_mcp_body(&body) {
        Ok(parts) => parts,
        Err(message) => return ApiError::bad_request(message, request_id).into_response(),
    };

    if !is_accepted_mcp_method(&method) {
        return ApiError::bad_request(format!("unsupported method '{method}'"), request_id)
            .into_response();
    }

    let call = ProxyCall {
        kind: TargetKind::Connector,
        target_name: connector.clone(),
        required: mcp_required(&method, &connector),
        method,
        params,
    };
    dispatch(&state, request_id, &auth, call).await
}

/// `POST /a2a/v1/*`: forward one A2A call to an agent. All four mounted
/// paths share this handler; the body's `method` drives dispatch and
/// permission kind.
pub(crate) async fn a2a_proxy(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(auth): Extension<AuthInfo>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(bytes) => bytes,
        Err(rejection) => return body_rejection(&rejection, request_id),
    };
    let (agent, method, params) = match parse_a2a_body(&body) {
        Ok(parts) => parts,
        Err(message) => return ApiError::bad_request(message, request_id).into_response(),
    };

    let Some(kind) = a2a_kind(&method) else {
        return ApiError::bad_request(format!("unsupported method '{method}'"), request_id)
            .into_response();
    };

    let call = ProxyCall {
        kind: TargetKind::Agent,
        target_name: agent.clone(),
        required: a2a_required(kind, &agent),
        method,
        params,
    };
    dispatch(&state, request_id, &auth, call).await
}

struct ProxyCall {
    kind: TargetKind,
    target_name: String,
    required: String,
    method: String,
    params: Option<Value>,
}

/// The shared enqueue/translate skeleton behind both dialect handlers.
async fn dispatch(
    state: &Arc<AppState>,
    request_id: RequestId,
    auth: &AuthInfo,
    call: ProxyCall,
) -> Response {
    let allowed = has_permission(&auth.permissions, &call.required);
    let target_id = TargetId::new(call.target_name.clone());
    let usable = state
        .target(&target_id)
        .filter(|t| t.kind == call.kind && t.enabled);

    // Under hide-not-found the permission check runs before target
    // existence, so a denied caller sees the same 403 whether the target
    // exists or not and cannot probe the catalog.
    let target: Target = if state.hide_not_found {
        if !allowed {
            return ApiError::forbidden(request_id)
                .with_target(&call.target_name)
                .into_response();
        }
        match usable {
            Some(t) => t.clone(),
            None => {
                return ApiError::forbidden(request_id)
                    .with_target(&call.target_name)
                    .into_response();
            }
        }
    } else {
        match usable {
            Some(t) => {
                if !allowed {
                    return ApiError::forbidden(request_id)
                        .with_target(&call.target_name)
                        .into_response();
                }
                t.clone()
            }
            None => {
                return ApiError::not_found(
                    format!("target '{}' not found", call.target_name),
                    request_id,
                )
                .with_target(&call.target_name)
                .into_response();
            }
        }
    };

    let upstream = match target.kind {
        TargetKind::Connector => Arc::clone(&state.mcp),
        TargetKind::Agent => Arc::clone(&state.a2a),
    };

    let outcome = {
        let target = target.clone();
        let method = call.method;
        let params = call.params;
        state
            .engine
            .enqueue(&target_id, move |cancel| async move {
                upstream.call(&target, &method, params, cancel).await
            })
            .await
    };

    match outcome {
        Ok(completion) => match completion {
            Completion {
                value: UpstreamOutcome::Result(result),
                queue_wait_ms,
                upstream_latency_ms,
            } => success_response(result, target_id.as_str(), queue_wait_ms, upstream_latency_ms),
            Completion {
                value: UpstreamOutcome::Error { code, message },
                queue_wait_ms,
                upstream_latency_ms,
            } => {
                let (status, error_code) = upstream_error_status(code);
                ApiError::new(status, error_code, message, request_id)
                    .with_target(target_id.as_str())
                    .with_decision("allow")
                    .with_timings(queue_wait_ms, upstream_latency_ms)
                    .into_response()
            }
        },
        Err(err) => queue_error_response(&err, &target_id, request_id),
    }
}

/// Map an upstream JSON-RPC error code onto the HTTP surface.
fn upstream_error_status(code: i64) -> (StatusCode, ErrorCode) {
    match code {
        rpc_code::METHOD_NOT_FOUND => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
        rpc_code::INVALID_PARAMS => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        rpc_code::INVALID_REQUEST | rpc_code::INTERNAL_ERROR => {
            (StatusCode::BAD_GATEWAY, ErrorCode::BadGateway)
        }
        _ => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
    }
}

fn queue_error_response(
    err: &QueueError<UpstreamError>,
    target_id: &TargetId,
    request_id: RequestId,
) -> Response {
    let error = match err {
        QueueError::Full(t) => ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::TooManyRequests,
            format!("queue full for target '{t}'"),
            request_id,
        ),
        QueueError::Timeout(_) => ApiError::new(
            StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::GatewayTimeout,
            "deadline exceeded",
            request_id,
        ),
        QueueError::Executor(upstream_err) if upstream_err.is_cancelled() => ApiError::new(
            StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::GatewayTimeout,
            "deadline exceeded",
            request_id,
        ),
        QueueError::Executor(upstream_err) => ApiError::new(
            StatusCode::BAD_GATEWAY,
            ErrorCode::BadGateway,
            upstream_err.to_string(),
            request_id,
        ),
        QueueError::Crashed => ApiError::internal(request_id),
        QueueError::Shutdown => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "gateway shutting down",
            request_id,
        ),
    };
    error
        .with_target(target_id.as_str())
        .with_decision("allow")
        .into_response()
}

fn parse_object(bytes: &[u8]) -> Result<serde_json::Map<String, Value>, String> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("body is not valid JSON: {e}"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("body must be a JSON object".to_owned()),
    }
}

fn required_string(
    map: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, String> {
    map.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| format!("missing or invalid field '{field}'"))
}

fn parse_mcp_body(bytes: &[u8]) -> Result<(String, String, Option<Value>), String> {
    let map = parse_object(bytes)?;
    let connector = required_string(&map, "connector")?;
    let method = required_string(&map, "method")?;
    if let Some(id) = map.get("id") {
        if !(id.is_number() || id.is_string()) {
            return Err("field 'id' must be a number or string".to_owned());
        }
    }
    Ok((connector, method, map.get("params").cloned()))
}

fn parse_a2a_body(bytes: &[u8]) -> Result<(String, String, Option<Value>), String> {
    let map = parse_object(bytes)?;
    let agent = required_string(&map, "agent")?;
    let method = required_string(&map, "method")?;
    Ok((agent, method, map.get("params").cloned()))
}
