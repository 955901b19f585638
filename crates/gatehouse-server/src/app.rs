//! Router assembly.

use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers;
use crate::middleware::{authenticate, observe};
use crate::state::AppState;

/// Build the gateway router.
///
/// Layering, outermost first: body cap, request id + access log,
/// authentication, then the handlers. The request id therefore exists
/// before any auth error is produced, and every response — including
/// 401s and 413s — lands in the access log.
pub fn build_router(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/mcp/v1/message", post(handlers::mcp_proxy))
        .route("/a2a/v1/message/send", post(handlers::a2a_proxy))
        .route("/a2a/v1/tasks/send", post(handlers::a2a_proxy))
        .route("/a2a/v1/tasks/get", post(handlers::a2a_proxy))
        .route("/a2a/v1/tasks/cancel", post(handlers::a2a_proxy))
        .fallback(handlers::fallback)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            authenticate,
        ))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), observe))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
