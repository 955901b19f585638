//! Gatehouse Server - The gateway's HTTP surface and lifecycle.
//!
//! This crate wires everything together:
//! - An `axum` router with the MCP endpoint, the four A2A endpoints, and
//!   the public `/health` probe
//! - Middleware for request ids, authentication, and the access log
//! - Proxy handlers that check permissions, resolve targets, dispatch
//!   through the admission queue, and translate upstream outcomes into
//!   HTTP responses with timing headers
//! - [`GatewayServer`]: bind, serve, drain, and shut down cleanly
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_config::GatewayConfig;
//! use gatehouse_server::GatewayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gatehouse_server::ServerError> {
//!     let config = GatewayConfig::load("gateway.toml")?;
//!     let server = GatewayServer::start(config).await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod app;
mod error;
mod handlers;
mod lifecycle;
mod middleware;
mod response;
mod state;
mod upstream;

pub use app::build_router;
pub use error::{ServerError, ServerResult};
pub use lifecycle::{GatewayServer, ServerOptions, active_signal_listeners};
pub use state::AppState;
pub use upstream::{A2aProxy, McpProxy, ProxyUpstream, UpstreamError};
