//! Configuration structures.

use gatehouse_core::Target;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the request body cap: 100 MiB. Larger configured
/// values are clamped, never honored.
pub const MAX_BODY_CEILING: u64 = 100 * 1024 * 1024;

/// Top-level gateway configuration.
///
/// Every field has a default, so an empty file (or `GatewayConfig::default()`)
/// yields a runnable localhost gateway with no auth and no targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Request body cap, as bytes or a `kb`/`mb`/`gb`-suffixed string.
    /// Clamped to [`MAX_BODY_CEILING`].
    pub max_body_size: String,

    /// Whether a missing target is reported as 403 instead of 404, so
    /// callers without permission cannot probe target existence.
    pub hide_not_found: bool,

    /// Per-target admission settings.
    pub queue: QueueSettings,

    /// Authentication settings.
    pub auth: AuthSettings,

    /// Diagnostic and access logging.
    pub logging: LoggingSettings,

    /// Configured upstream targets.
    pub targets: Vec<Target>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            hide_not_found: default_true(),
            queue: QueueSettings::default(),
            auth: AuthSettings::default(),
            logging: LoggingSettings::default(),
            targets: Vec::new(),
        }
    }
}

/// Per-target admission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Total budget per request in milliseconds, measured from admission.
    /// Covers queue wait and the upstream call together.
    pub timeout_ms: u64,

    /// Maximum number of requests waiting per target, beyond the one
    /// in flight.
    pub max_queue_per_target: usize,

    /// Maximum concurrent upstream calls per target. The design value is
    /// 1; everything downstream assumes serial execution.
    pub max_inflight_per_target: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_queue_per_target: default_max_queue(),
            max_inflight_per_target: default_max_inflight(),
        }
    }
}

/// How inbound requests authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No authentication; every request runs with full permissions.
    #[default]
    None,
    /// `Authorization: Bearer <token>` validated against configured hashes.
    Bearer,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Authentication mode.
    pub mode: AuthMode,

    /// Accepted tokens (hashes only; plaintext is never configured).
    pub tokens: Vec<TokenEntry>,
}

/// One accepted bearer token.
///
/// The `hash` is `"sha256:"` followed by 64 lowercase hex characters.
/// Plaintext-to-hash conversion happens in the `gatehouse hash-token`
/// tool, never inside the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Display name, logged as `client_id`. Never the secret.
    pub name: String,

    /// `sha256:<64 lowercase hex>` digest of the token plaintext.
    pub hash: String,

    /// Permission strings granted to this token.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Diagnostic log level (`error`..`trace` filter spec).
    pub level: String,

    /// Diagnostic log format: `pretty`, `compact`, or `json`.
    pub format: String,

    /// Optional path for the JSON-lines request event log. When unset the
    /// event log writes to stdout.
    pub access_log: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            access_log: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_size() -> String {
    "1mb".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_queue() -> usize {
    10
}

fn default_max_inflight() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}
