//! MCP adapter error types.

/// Errors from spawning or talking to an MCP connector subprocess.
///
/// These are transport-level failures; a JSON-RPC *error response* from
/// the connector is not an error here — it flows through as an
/// [`UpstreamOutcome::Error`](gatehouse_core::UpstreamOutcome).
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The target's config blob is not a valid connector config.
    #[error("invalid connector config for '{target}': {message}")]
    Config {
        /// Offending target id.
        target: String,
        /// What was wrong.
        message: String,
    },

    /// The child process could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command that failed.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The child never completed the `initialize` exchange.
    #[error("connector did not complete initialize: {0}")]
    Handshake(String),

    /// Writing to or reading from the child failed mid-stream.
    #[error("stdio transport failed: {0}")]
    Transport(String),

    /// A frame could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller's cancellation token fired while waiting.
    #[error("call cancelled")]
    Cancelled,

    /// The child exited (or its reader task died) with the call pending.
    #[error("connector closed the transport")]
    ChannelClosed,
}

/// Result type for MCP adapter operations.
pub type McpResult<T> = Result<T, McpError>;
