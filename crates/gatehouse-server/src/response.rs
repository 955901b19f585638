//! Response construction: error bodies, success bodies, timing headers.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gatehouse_core::{ErrorCode, RequestId};
use serde_json::{Value, json};

/// Header carrying the admission-to-execution wait in milliseconds.
pub(crate) const QUEUE_WAIT_HEADER: &str = "x-queue-wait-ms";

/// Header carrying the executor-entry-to-return latency in milliseconds.
pub(crate) const UPSTREAM_LATENCY_HEADER: &str = "x-upstream-latency-ms";

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Fields the access-log middleware reads back off the response.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogContext {
    /// Target the request addressed, once known.
    pub target_id: Option<String>,
    /// Authorization decision, once made.
    pub decision: Option<&'static str>,
    /// Queue wait, when the request reached the upstream.
    pub queue_wait_ms: Option<u64>,
    /// Upstream latency, when the request reached the upstream.
    pub upstream_latency_ms: Option<u64>,
}

/// Authenticated client name, echoed into the access log.
#[derive(Debug, Clone)]
pub(crate) struct ClientId(pub String);

/// A fully-described HTTP error: status, stable code, message, and the
/// request id that every non-2xx body must echo.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
    request_id: RequestId,
    context: LogContext,
    timings: Option<(u64, u64)>,
}

impl ApiError {
    pub(crate) fn new(
        status: StatusCode,
        code: ErrorCode,
        message: impl Into<String>,
        request_id: RequestId,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id,
            context: LogContext::default(),
            timings: None,
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>, request_id: RequestId) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message, request_id)
    }

    pub(crate) fn forbidden(request_id: RequestId) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "permission denied",
            request_id,
        )
        .with_decision("deny")
    }

    pub(crate) fn not_found(message: impl Into<String>, request_id: RequestId) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message, request_id)
    }

    pub(crate) fn internal(request_id: RequestId) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "internal error",
            request_id,
        )
    }

    /// Attach the target this request addressed.
    pub(crate) fn with_target(mut self, target: &str) -> Self {
        self.context.target_id = Some(target.to_owned());
        self
    }

    /// Record the authorization decision.
    pub(crate) fn with_decision(mut self, decision: &'static str) -> Self {
        self.context.decision = Some(decision);
        self
    }

    /// Attach upstream timings. Only 4xx responses derived from an
    /// upstream outcome carry timing headers; pre-admission errors and
    /// 5xx responses do not.
    pub(crate) fn with_timings(mut self, queue_wait_ms: u64, upstream_latency_ms: u64) -> Self {
        if self.status.is_client_error() {
            self.timings = Some((queue_wait_ms, upstream_latency_ms));
        }
        self.context.queue_wait_ms = Some(queue_wait_ms);
        self.context.upstream_latency_ms = Some(upstream_latency_ms);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "request_id": self.request_id.as_str(),
            }
        });

        let mut response = (self.status, body.to_string()).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        if let Some((wait, upstream)) = self.timings {
            set_timing_headers(&mut response, wait, upstream);
        }
        response.extensions_mut().insert(self.context);
        response
    }
}

/// Build the 200 success body with timing headers attached.
pub(crate) fn success_response(
    result: Value,
    target_id: &str,
    queue_wait_ms: u64,
    upstream_latency_ms: u64,
) -> Response {
    let body = json!({ "result": result });
    let mut response = (StatusCode::OK, body.to_string()).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
    set_timing_headers(&mut response, queue_wait_ms, upstream_latency_ms);
    response.extensions_mut().insert(LogContext {
        target_id: Some(target_id.to_owned()),
        decision: Some("allow"),
        queue_wait_ms: Some(queue_wait_ms),
        upstream_latency_ms: Some(upstream_latency_ms),
    });
    response
}

fn set_timing_headers(response: &mut Response, queue_wait_ms: u64, upstream_latency_ms: u64) {
    if let Ok(value) = HeaderValue::from_str(&queue_wait_ms.to_string()) {
        response.headers_mut().insert(QUEUE_WAIT_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&upstream_latency_ms.to_string()) {
        response
            .headers_mut()
            .insert(UPSTREAM_LATENCY_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let rid = RequestId::generate();
        let response =
            ApiError::bad_request("missing field 'connector'", rid.clone()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert!(!response.headers().contains_key(QUEUE_WAIT_HEADER));

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "missing field 'connector'");
        assert_eq!(body["error"]["request_id"], rid.as_str());
    }

    #[tokio::test]
    async fn test_success_carries_timing_headers() {
        let response = success_response(json!({"ok": true}), "yfinance", 12, 34);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[QUEUE_WAIT_HEADER], "12");
        assert_eq!(response.headers()[UPSTREAM_LATENCY_HEADER], "34");

        let body = body_json(response).await;
        assert_eq!(body["result"]["ok"], true);
    }

    #[tokio::test]
    async fn test_timings_attach_only_to_client_errors() {
        let rid = RequestId::generate();
        let with = ApiError::bad_request("upstream said no", rid.clone())
            .with_timings(5, 9)
            .into_response();
        assert_eq!(with.headers()[QUEUE_WAIT_HEADER], "5");

        let gateway_err = ApiError::new(
            StatusCode::BAD_GATEWAY,
            ErrorCode::BadGateway,
            "upstream protocol error",
            rid,
        )
        .with_timings(5, 9)
        .into_response();
        assert!(!gateway_err.headers().contains_key(QUEUE_WAIT_HEADER));
    }
}
