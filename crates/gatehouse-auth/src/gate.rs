//! The authentication gate run ahead of every handler.

use std::collections::HashSet;

use gatehouse_config::{AuthMode, AuthSettings};

use crate::error::{AuthError, AuthResult};
use crate::token::{AuthToken, hash_token};

/// Identity attached to a request after the gate runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// Token display name, or `"anonymous"`.
    pub client_id: String,
    /// Permissions the request may exercise.
    pub permissions: Vec<String>,
}

impl AuthInfo {
    /// Identity for public paths: anonymous with no permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            client_id: "anonymous".to_owned(),
            permissions: Vec::new(),
        }
    }

    /// Identity for auth mode `none`: anonymous with everything.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self {
            client_id: "anonymous".to_owned(),
            permissions: vec!["*".to_owned()],
        }
    }
}

/// Validates inbound credentials and produces an [`AuthInfo`].
///
/// Constructed once at startup; token hashes are parsed eagerly so a
/// malformed config fails before the listener binds.
#[derive(Debug)]
pub struct AuthGate {
    mode: AuthMode,
    tokens: Vec<AuthToken>,
    public_paths: HashSet<String>,
}

impl AuthGate {
    /// Build a gate from validated auth settings.
    ///
    /// `/health` is always public.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHash`] if any configured hash fails
    /// to parse. Config validation catches this earlier for file-based
    /// setups; library embedders hit it here.
    pub fn from_settings(settings: &AuthSettings) -> AuthResult<Self> {
        let tokens = settings
            .tokens
            .iter()
            .map(AuthToken::from_entry)
            .collect::<AuthResult<Vec<_>>>()?;

        let mut public_paths = HashSet::new();
        public_paths.insert("/health".to_owned());

        Ok(Self {
            mode: settings.mode,
            tokens,
            public_paths,
        })
    }

    /// Mark an additional path as public (exact match).
    #[must_use]
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.insert(path.into());
        self
    }

    /// Whether a path bypasses authentication.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.contains(path)
    }

    /// Authenticate one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when the header is absent or
    /// not a `Bearer` credential, and [`AuthError::InvalidToken`] when
    /// the presented token matches no configured hash.
    pub fn authenticate(&self, path: &str, authorization: Option<&str>) -> AuthResult<AuthInfo> {
        if self.is_public(path) {
            return Ok(AuthInfo::anonymous());
        }

        match self.mode {
            AuthMode::None => Ok(AuthInfo::unrestricted()),
            AuthMode::Bearer => self.check_bearer(authorization),
        }
    }

    fn check_bearer(&self, authorization: Option<&str>) -> AuthResult<AuthInfo> {
        let presented = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let digest = hash_token(presented);

        // Each candidate comparison is constant-time over the 32 digest
        // bytes; iteration stops only after a successful match.
        for token in &self.tokens {
            if token.hash.matches(&digest) {
                return Ok(AuthInfo {
                    client_id: token.name.clone(),
                    permissions: token.permissions.clone(),
                });
            }
        }

        tracing::debug!("presented token matched no configured credential");
        Err(AuthError::InvalidToken)
    }
}
