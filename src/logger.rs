//! Leveled, prefix-scoped logger.
//!
//! A [`Logger`] formats lines as `[timestamp] <prefix> [LEVEL] message` and
//! hands them to a [`LogSink`]. The default sink forwards to `tracing`, so
//! consumers wire up their own subscriber. Tests swap in a [`MemorySink`].

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level that is emitted (default: Info)
    pub level: LogLevel,
    /// Base prefix (default: `[poolkit]`)
    pub prefix: String,
    /// Prepend an RFC 3339 timestamp (default: true)
    pub timestamp: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            prefix: "[poolkit]".to_string(),
            timestamp: true,
        }
    }
}

impl LoggerConfig {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = enabled;
        self
    }
}

// ============================================================================
// Records and sinks
// ============================================================================

/// Second argument of a log call.
#[derive(Clone, Copy)]
pub enum Payload<'a> {
    Fields(&'a Value),
    Error(&'a (dyn StdError + 'static)),
}

impl fmt::Display for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Fields(value) => write!(f, "{}", value),
            Payload::Error(err) => {
                write!(f, "{}", err)?;
                let mut source = err.source();
                while let Some(cause) = source {
                    write!(f, ": {}", cause)?;
                    source = cause.source();
                }
                Ok(())
            }
        }
    }
}

/// A single log event handed to a sink.
pub struct LogRecord<'a> {
    pub level: LogLevel,
    pub prefix: &'a str,
    pub message: &'a str,
    /// The fully formatted line
    pub line: &'a str,
    pub payload: Option<Payload<'a>>,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord<'_>);
}

/// Forwards records to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord<'_>) {
        let payload = record.payload.map(|p| p.to_string());
        let payload = payload.as_deref();
        let prefix = record.prefix;
        let message = record.message;

        match record.level {
            LogLevel::Debug => tracing::debug!(prefix, payload, "{}", message),
            LogLevel::Info => tracing::info!(prefix, payload, "{}", message),
            LogLevel::Warn => tracing::warn!(prefix, payload, "{}", message),
            LogLevel::Error => tracing::error!(prefix, payload, "{}", message),
            LogLevel::Fatal => tracing::error!(prefix, payload, fatal = true, "{}", message),
        }
    }
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecord {
    pub level: LogLevel,
    pub message: String,
    pub line: String,
    pub payload: Option<String>,
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured records.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// True if a record with this level and exact message was captured.
    pub fn contains(&self, level: LogLevel, message: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message == message)
    }

    /// Number of records captured at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord<'_>) {
        self.records.lock().push(CapturedRecord {
            level: record.level,
            message: record.message.to_string(),
            line: record.line.to_string(),
            payload: record.payload.map(|p| p.to_string()),
        });
    }
}

// ============================================================================
// Logger
// ============================================================================

/// Leveled logger with a nestable prefix.
#[derive(Clone)]
pub struct Logger {
    level: LogLevel,
    prefix: String,
    timestamp: bool,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Create a logger that writes to `tracing`.
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a logger that writes to the given sink.
    pub fn with_sink(config: LoggerConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            level: config.level,
            prefix: config.prefix,
            timestamp: config.timestamp,
            sink,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive a logger whose prefix is this one's plus `prefix`.
    ///
    /// Level, timestamp setting and sink are inherited.
    pub fn child(&self, prefix: &str) -> Logger {
        Logger {
            level: self.level,
            prefix: format!("{} {}", self.prefix, prefix),
            timestamp: self.timestamp,
            sink: Arc::clone(&self.sink),
        }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    fn format_line(&self, level: LogLevel, message: &str) -> String {
        if self.timestamp {
            format!(
                "[{}] {} [{}] {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                self.prefix,
                level,
                message
            )
        } else {
            format!("{} [{}] {}", self.prefix, level, message)
        }
    }

    /// Emit a record if `level` passes the threshold.
    pub fn log(&self, level: LogLevel, message: &str, payload: Option<Payload<'_>>) {
        if !self.enabled(level) {
            return;
        }
        let line = self.format_line(level, message);
        self.sink.write(&LogRecord {
            level,
            prefix: &self.prefix,
            message,
            line: &line,
            payload,
        });
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn debug_fields(&self, message: &str, fields: &Value) {
        self.log(LogLevel::Debug, message, Some(Payload::Fields(fields)));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message, None);
    }

    /// Log at error level with the causing error as payload.
    pub fn error_cause(&self, message: &str, cause: &(dyn StdError + 'static)) {
        self.log(LogLevel::Error, message, Some(Payload::Error(cause)));
    }

    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message, None);
    }

    pub fn fatal_cause(&self, message: &str, cause: &(dyn StdError + 'static)) {
        self.log(LogLevel::Fatal, message, Some(Payload::Error(cause)));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("prefix", &self.prefix)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}
