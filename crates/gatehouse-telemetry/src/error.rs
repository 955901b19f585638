//! Telemetry error types.

use thiserror::Error;

/// Errors from logging setup and the event log.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter string or format name could not be parsed.
    #[error("invalid logging configuration: {0}")]
    Config(String),

    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    Init(String),

    /// The event-log sink could not be opened or written.
    #[error("event log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
