//! Server startup and lifecycle error types.

/// Errors that abort gateway startup or shutdown.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] gatehouse_config::ConfigError),

    /// Auth settings could not be turned into a gate.
    #[error(transparent)]
    Auth(#[from] gatehouse_auth::AuthError),

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] gatehouse_telemetry::TelemetryError),

    /// The A2A HTTP client could not be built.
    #[error(transparent)]
    A2a(#[from] gatehouse_a2a::A2aError),

    /// The listener could not bind.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The serve loop failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
