//! Gatehouse MCP - Stdio subprocess upstream adapter.
//!
//! Each MCP connector target maps to one child process speaking
//! newline-delimited JSON-RPC 2.0 over stdin/stdout. Children are
//! spawned lazily on the first request for their target, initialized
//! with the MCP handshake, and reused until gateway shutdown.
//!
//! The transport owns a reader task that demuxes responses into a
//! pending-request map; callers await their response or bail out when
//! their cancellation token fires.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod client;
mod config;
mod error;
mod registry;
mod transport;

pub use client::McpClient;
pub use config::ConnectorConfig;
pub use error::{McpError, McpResult};
pub use registry::McpRegistry;
pub use transport::JsonRpcPeer;
