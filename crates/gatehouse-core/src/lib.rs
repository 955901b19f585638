//! Gatehouse Core - Foundation types for the Gatehouse protocol gateway.
//!
//! This crate provides:
//! - Monotonic, lexicographically-sortable request identifiers
//! - The target model (connectors and agents)
//! - JSON-RPC 2.0 envelope types shared by the MCP and A2A dialects
//! - The error-code vocabulary used in HTTP error bodies

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod jsonrpc;
pub mod request_id;
pub mod target;

pub use error::{CoreError, CoreResult, ErrorCode};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, UpstreamOutcome, rpc_code};
pub use request_id::RequestId;
pub use target::{Target, TargetId, TargetKind, TargetProtocol};
