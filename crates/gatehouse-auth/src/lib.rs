//! Gatehouse Auth - Authentication and authorization for the gateway.
//!
//! This crate provides:
//! - SHA-256 token hashing with constant-time comparison against the
//!   configured digests
//! - The [`AuthGate`] pre-handler: public-path bypass, `none` and
//!   `bearer` modes, [`AuthInfo`] attachment
//! - Wildcard-prefix permission matching and required-permission
//!   construction for the MCP and A2A dialects
//!
//! The presented token plaintext exists only transiently on the request
//! path; it is hashed immediately and never stored, logged, or echoed.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod gate;
mod permission;
mod token;

pub use error::{AuthError, AuthResult};
pub use gate::{AuthGate, AuthInfo};
pub use permission::{a2a_kind, a2a_required, has_permission, mcp_method_group, mcp_required};
pub use token::{AuthToken, TokenHash, hash_token};
