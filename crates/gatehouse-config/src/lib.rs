//! Gatehouse Config - Configuration model for the Gatehouse gateway.
//!
//! This crate provides:
//! - The [`GatewayConfig`] structure with serde-backed defaults
//! - A TOML file loader for standalone deployments
//! - Construction-time validation; any failure aborts startup
//!
//! Configuration is immutable once loaded. Changing it means restarting
//! the gateway.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::{
    AuthMode, AuthSettings, GatewayConfig, LoggingSettings, QueueSettings, TokenEntry,
    MAX_BODY_CEILING,
};
pub use validate::{parse_body_size, validate};
