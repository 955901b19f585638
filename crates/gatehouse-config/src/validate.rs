//! Construction-time configuration validation.
//!
//! Every check here runs before the gateway binds its listener; any
//! failure aborts startup.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AuthMode, GatewayConfig, MAX_BODY_CEILING};

/// Characters that must never appear in a configured host.
const FORBIDDEN_HOST_CHARS: &[char] = &[' ', '<', '>', '{', '}', '|', '\\', '^', '`'];

fn body_size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Grammar is validated case-insensitively; the unit is optional.
    RE.get_or_init(|| Regex::new(r"(?i)^\d+(kb|mb|gb)?$").expect("fixed pattern compiles"))
}

fn token_hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^sha256:[0-9a-f]{64}$").expect("fixed pattern compiles"))
}

/// Validate a fully-deserialized configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::Validation`] encountered.
pub fn validate(config: &GatewayConfig) -> ConfigResult<()> {
    validate_host(config)?;
    validate_body_size(config)?;
    validate_queue(config)?;
    validate_auth(config)?;
    validate_logging(config)?;
    validate_targets(config)?;
    Ok(())
}

fn validate_host(config: &GatewayConfig) -> ConfigResult<()> {
    let host = config.host.trim();
    if host.is_empty() {
        return Err(ConfigError::validation("host", "must not be empty"));
    }
    if let Some(bad) = host.chars().find(|c| FORBIDDEN_HOST_CHARS.contains(c)) {
        return Err(ConfigError::validation(
            "host",
            format!("contains forbidden character {bad:?}"),
        ));
    }
    Ok(())
}

fn validate_body_size(config: &GatewayConfig) -> ConfigResult<()> {
    parse_body_size(&config.max_body_size).map(|_| ())
}

fn validate_queue(config: &GatewayConfig) -> ConfigResult<()> {
    let q = &config.queue;
    if q.timeout_ms == 0 {
        return Err(ConfigError::validation(
            "queue.timeout_ms",
            "must be greater than zero",
        ));
    }
    if q.max_inflight_per_target == 0 {
        return Err(ConfigError::validation(
            "queue.max_inflight_per_target",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_auth(config: &GatewayConfig) -> ConfigResult<()> {
    if config.auth.mode != AuthMode::Bearer {
        return Ok(());
    }
    for (i, token) in config.auth.tokens.iter().enumerate() {
        if token.name.trim().is_empty() {
            return Err(ConfigError::validation(
                &format!("auth.tokens[{i}].name"),
                "must not be empty",
            ));
        }
        if !token_hash_re().is_match(&token.hash) {
            return Err(ConfigError::validation(
                &format!("auth.tokens[{i}].hash"),
                "must match sha256:<64 lowercase hex characters>",
            ));
        }
    }
    Ok(())
}

fn validate_logging(config: &GatewayConfig) -> ConfigResult<()> {
    if !matches!(config.logging.format.as_str(), "pretty" | "compact" | "json") {
        return Err(ConfigError::validation(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json",
                config.logging.format
            ),
        ));
    }
    Ok(())
}

fn validate_targets(config: &GatewayConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for (i, target) in config.targets.iter().enumerate() {
        if target.id.as_str().trim().is_empty() {
            return Err(ConfigError::validation(
                &format!("targets[{i}].id"),
                "must not be empty",
            ));
        }
        if !seen.insert(target.id.clone()) {
            return Err(ConfigError::validation(
                &format!("targets[{i}].id"),
                format!("duplicate target id '{}'", target.id),
            ));
        }
    }
    Ok(())
}

/// Parse a body-cap value into bytes, clamped to [`MAX_BODY_CEILING`].
///
/// Accepts a bare byte count or a `kb`/`mb`/`gb` suffix, case-insensitive.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when the input does not match
/// `^\d+(kb|mb|gb)?$`.
pub fn parse_body_size(input: &str) -> ConfigResult<u64> {
    if !body_size_re().is_match(input) {
        return Err(ConfigError::validation(
            "max_body_size",
            format!("'{input}' does not match <digits>[kb|mb|gb]"),
        ));
    }

    let lower = input.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(n) = lower.strip_suffix("kb") {
        (n, 1024_u64)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("gb") {
        (n, 1024 * 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };

    // Values past the ceiling (including u64 overflow) clamp rather than fail.
    let bytes = digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(MAX_BODY_CEILING);
    Ok(bytes.min(MAX_BODY_CEILING))
}
