//! `tracing` subscriber setup for developer diagnostics.
//!
//! This configures what engineers see on stderr; the normative per-request
//! access log is the [`EventLog`](crate::EventLog) and is configured
//! separately.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for diagnostic logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::Config(format!(
                "unknown log format '{other}'; expected one of: pretty, compact, json"
            ))),
        }
    }
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level filter, e.g. `"info"` or `"debug"`.
    level: String,
    /// Output format.
    format: LogFormat,
    /// Additional per-module directives, e.g. `"gatehouse_queue=trace"`.
    directives: Vec<String>,
}

impl LogConfig {
    /// Create a config with the given base level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-module filter directive.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut spec = self.level.clone();
        for d in &self.directives {
            spec.push(',');
            spec.push_str(d);
        }
        spec.parse::<EnvFilter>()
            .map_err(|e| TelemetryError::Config(format!("bad filter '{spec}': {e}")))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the global diagnostic subscriber.
///
/// `RUST_LOG`, when set, overrides the configured level and directives.
///
/// # Errors
///
/// Returns [`TelemetryError::Config`] for an unparsable filter and
/// [`TelemetryError::Init`] when a global subscriber is already installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => config.env_filter()?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

/// Install the global subscriber with `info` level and pretty output.
///
/// # Errors
///
/// Same as [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}
