//! Core error types and the error-code vocabulary.

use serde::{Deserialize, Serialize};

/// Error-code identifiers carried in HTTP error bodies.
///
/// These are the stable machine-readable codes clients match on; the
/// accompanying HTTP status is chosen by the server layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed body, unsupported method, or a non-transport upstream error.
    BadRequest,
    /// Missing or malformed `Authorization` header.
    Unauthorized,
    /// A bearer token was presented but matched no configured token.
    InvalidToken,
    /// Permission denied, or a hidden target under hide-not-found.
    Forbidden,
    /// Target not found (only surfaced when hide-not-found is off).
    NotFound,
    /// Per-target admission queue is full.
    TooManyRequests,
    /// Upstream transport or protocol failure.
    BadGateway,
    /// Deadline elapsed while waiting or during the upstream call.
    GatewayTimeout,
    /// Unexpected failure after admission.
    InternalError,
}

impl ErrorCode {
    /// The wire identifier, e.g. `TOO_MANY_REQUESTS`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::BadGateway => "BAD_GATEWAY",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from core type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A request id had the wrong length or contained a character
    /// outside the Crockford Base32 alphabet.
    #[error("invalid request id: {0}")]
    InvalidRequestId(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
