//! Authentication error types.

/// Errors from the authentication layer.
///
/// Variants deliberately carry no token material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header, or a scheme other than `Bearer`.
    #[error("missing or malformed Authorization header")]
    Unauthorized,

    /// A bearer token was presented but matched no configured token.
    #[error("token does not match any configured credential")]
    InvalidToken,

    /// A configured token hash was not `sha256:<64 lowercase hex>`.
    #[error("malformed token hash for '{name}'")]
    MalformedHash {
        /// Display name of the offending token entry.
        name: String,
    },
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
