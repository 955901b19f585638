//! A2A adapter error types.

/// Errors from calling a remote A2A agent.
///
/// A JSON-RPC error *response* from the agent is not an error here; it
/// flows through as an
/// [`UpstreamOutcome::Error`](gatehouse_core::UpstreamOutcome).
#[derive(Debug, thiserror::Error)]
pub enum A2aError {
    /// The target's config blob is not a valid agent config.
    #[error("invalid agent config for '{target}': {message}")]
    Config {
        /// Offending target id.
        target: String,
        /// What was wrong.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("cannot build HTTP client: {0}")]
    Client(String),

    /// The POST failed below the JSON-RPC layer.
    #[error("agent transport failed: {0}")]
    Transport(String),

    /// The agent answered with a non-success HTTP status.
    #[error("agent returned HTTP {status}")]
    HttpStatus {
        /// The status code the agent returned.
        status: u16,
    },

    /// The agent's body was not a JSON-RPC response.
    #[error("agent returned a malformed response: {0}")]
    MalformedResponse(String),

    /// The caller's cancellation token fired mid-call.
    #[error("call cancelled")]
    Cancelled,
}

/// Result type for A2A adapter operations.
pub type A2aResult<T> = Result<T, A2aError>;
