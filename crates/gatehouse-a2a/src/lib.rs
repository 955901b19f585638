//! Gatehouse A2A - Remote agent upstream adapter.
//!
//! A2A agent targets are remote JSON-RPC 2.0 endpoints reached over
//! HTTPS. Each call is one POST of the request envelope to the agent's
//! configured URL; there is no session state and no retry.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod client;
mod config;
mod error;

pub use client::A2aClient;
pub use config::AgentConfig;
pub use error::{A2aError, A2aResult};
