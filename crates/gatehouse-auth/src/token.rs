//! Token hashing and constant-time credential matching.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AuthError, AuthResult};

/// Prefix every configured token digest carries.
const HASH_PREFIX: &str = "sha256:";

/// Hash a presented token plaintext.
///
/// This is the only operation the gateway ever performs on plaintext;
/// the digest is compared and the plaintext dropped.
#[must_use]
pub fn hash_token(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// A configured SHA-256 token digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    /// Parse a `sha256:<64 lowercase hex>` string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHash`] when the prefix, length, or
    /// hex alphabet is wrong. `name` labels the error; it is the token's
    /// display name, never its secret.
    pub fn parse(value: &str, name: &str) -> AuthResult<Self> {
        let malformed = || AuthError::MalformedHash {
            name: name.to_owned(),
        };

        let hex_part = value.strip_prefix(HASH_PREFIX).ok_or_else(malformed)?;
        if hex_part.len() != 64 || hex_part.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(malformed());
        }
        let bytes = hex::decode(hex_part).map_err(|_| malformed())?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(Self(digest))
    }

    /// Wrap a raw digest.
    #[must_use]
    pub fn from_bytes(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Constant-time equality against a presented digest.
    ///
    /// Both operands are fixed-width SHA-256 outputs, so there is no
    /// length channel. Uses `subtle`, whose compiler barriers keep LLVM
    /// from collapsing the comparison into an early exit.
    #[must_use]
    pub fn matches(&self, presented: &[u8; 32]) -> bool {
        bool::from(self.0.as_slice().ct_eq(presented.as_slice()))
    }

    /// Render as the canonical `sha256:<hex>` form.
    #[must_use]
    pub fn to_config_string(&self) -> String {
        format!("{HASH_PREFIX}{}", hex::encode(self.0))
    }
}

/// A configured token ready for matching: display name, parsed digest,
/// granted permissions.
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// Display name, logged as `client_id`.
    pub name: String,
    /// Parsed digest of the token plaintext.
    pub hash: TokenHash,
    /// Permission strings granted to this token.
    pub permissions: Vec<String>,
}

impl AuthToken {
    /// Build from a config entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHash`] if the entry's hash string is
    /// not `sha256:<64 lowercase hex>`.
    pub fn from_entry(entry: &gatehouse_config::TokenEntry) -> AuthResult<Self> {
        Ok(Self {
            name: entry.name.clone(),
            hash: TokenHash::parse(&entry.hash, &entry.name)?,
            permissions: entry.permissions.clone(),
        })
    }
}
