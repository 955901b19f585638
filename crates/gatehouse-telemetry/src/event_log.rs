//! The request event log.
//!
//! One JSON object per event, one line per object, written atomically
//! under a mutex. The log injects `timestamp` (ISO-8601, millisecond
//! precision, UTC) and `level`; every other field is caller-supplied and
//! passed through verbatim.
//!
//! The event log never sees tokens, passwords, or raw bodies — callers
//! own that contract; the log does not redact.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::error::TelemetryResult;

/// Severity of an event-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational events.
    Info,
    /// Unexpected but handled conditions.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// The lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(crate::TelemetryError::Config(format!(
                "unknown log level '{other}'"
            ))),
        }
    }
}

/// A JSON-lines event log with a minimum-level filter.
pub struct EventLog {
    min_level: LogLevel,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Create an event log writing to an arbitrary sink.
    #[must_use]
    pub fn new(min_level: LogLevel, sink: impl Write + Send + 'static) -> Self {
        Self {
            min_level,
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Create an event log writing to stdout.
    #[must_use]
    pub fn stdout(min_level: LogLevel) -> Self {
        Self::new(min_level, std::io::stdout())
    }

    /// Create an event log appending to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for appending.
    pub fn file(min_level: LogLevel, path: impl AsRef<Path>) -> TelemetryResult<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(min_level, file))
    }

    /// Log at debug level.
    pub fn debug(&self, event: &str, fields: Value) {
        self.write(LogLevel::Debug, event, fields);
    }

    /// Log at info level.
    pub fn info(&self, event: &str, fields: Value) {
        self.write(LogLevel::Info, event, fields);
    }

    /// Log at warn level.
    pub fn warn(&self, event: &str, fields: Value) {
        self.write(LogLevel::Warn, event, fields);
    }

    /// Log at error level.
    pub fn error(&self, event: &str, fields: Value) {
        self.write(LogLevel::Error, event, fields);
    }

    fn write(&self, level: LogLevel, event: &str, fields: Value) {
        if level < self.min_level {
            return;
        }

        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_owned(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        entry.insert(
            "level".to_owned(),
            Value::String(level.as_str().to_owned()),
        );
        entry.insert("event".to_owned(), Value::String(event.to_owned()));

        // Caller fields are appended verbatim; non-object payloads land
        // under a "data" key rather than being dropped.
        match fields {
            Value::Object(map) => {
                for (k, v) in map {
                    entry.insert(k, v);
                }
            }
            Value::Null => {}
            other => {
                entry.insert("data".to_owned(), other);
            }
        }

        let mut line = Value::Object(entry).to_string();
        line.push('\n');

        // The line is serialized before the lock is taken, so the critical
        // section is a single write call.
        if let Ok(mut sink) = self.sink.lock() {
            if let Err(e) = sink.write_all(line.as_bytes()) {
                tracing::warn!(error = %e, "event log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    /// A sink tests can read back.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn lines(&self) -> Vec<Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8(buf.clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_injects_timestamp_level_event() {
        let buf = SharedBuf::default();
        let log = EventLog::new(LogLevel::Debug, buf.clone());
        log.info("server_started", json!({"port": 3000}));

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["event"], "server_started");
        assert_eq!(lines[0]["port"], 3000);
        // ISO-8601 with millisecond precision, UTC.
        let ts = lines[0]["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }

    #[test]
    fn test_level_filter_drops_below_minimum() {
        let buf = SharedBuf::default();
        let log = EventLog::new(LogLevel::Warn, buf.clone());
        log.debug("a", Value::Null);
        log.info("b", Value::Null);
        log.warn("c", Value::Null);
        log.error("d", Value::Null);

        let events: Vec<String> = buf
            .lines()
            .iter()
            .map(|l| l["event"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(events, vec!["c", "d"]);
    }

    #[test]
    fn test_one_line_per_event() {
        let buf = SharedBuf::default();
        let log = EventLog::new(LogLevel::Info, buf.clone());
        log.info("http_request", json!({"request_id": "x", "status": 200}));
        log.info("http_request", json!({"request_id": "y", "status": 429}));

        let raw = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(raw.matches('\n').count(), 2);
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_caller_fields_pass_through_verbatim() {
        let buf = SharedBuf::default();
        let log = EventLog::new(LogLevel::Info, buf.clone());
        log.info(
            "http_request",
            json!({
                "request_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
                "method": "POST",
                "url": "/mcp/v1/message",
                "status": 200,
                "latency_ms": 12,
                "queue_wait_ms": 0,
            }),
        );
        let line = &buf.lines()[0];
        assert_eq!(line["request_id"], "01ARZ3NDEKTSV4RRFFQ69G5FAV");
        assert_eq!(line["latency_ms"], 12);
        assert_eq!(line["queue_wait_ms"], 0);
    }

    #[test]
    fn test_non_object_fields_land_under_data() {
        let buf = SharedBuf::default();
        let log = EventLog::new(LogLevel::Info, buf.clone());
        log.info("server_stopped", json!("bye"));
        assert_eq!(buf.lines()[0]["data"], "bye");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let log = EventLog::file(LogLevel::Info, &path).unwrap();
            log.info("server_started", Value::Null);
        }
        {
            let log = EventLog::file(LogLevel::Info, &path).unwrap();
            log.info("server_stopped", Value::Null);
        }
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }
}
