//! Gatehouse Telemetry - Logging and the request event log.
//!
//! This crate provides:
//! - Configurable `tracing` setup for developer diagnostics
//! - The [`EventLog`]: one JSON object per request-lifecycle event, with a
//!   minimum-level filter and atomic line writes
//!
//! # Example
//!
//! ```rust,no_run
//! use gatehouse_telemetry::{EventLog, LogConfig, LogFormat, LogLevel, setup_logging};
//!
//! # fn main() -> Result<(), gatehouse_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//!
//! let events = EventLog::stdout(LogLevel::Info);
//! events.info("server_started", serde_json::json!({"host": "127.0.0.1", "port": 3000}));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod event_log;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use event_log::{EventLog, LogLevel};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
