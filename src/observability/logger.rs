//! Structured JSON logger
//!
//! One JSON object per line, keys sorted. `event`, `severity` and `ts` are
//! reserved and override caller fields of the same name. Errors go to
//! stderr, the rest to stdout unless the target is [`LogTarget::Stderr`].
//! Lines below the process-wide minimum severity are dropped.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::Utc;
use serde_json::{Map, Value};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Parse a configured level name (case-insensitive)
    pub fn parse(level: &str) -> Option<Self> {
        match level.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Some(Severity::Trace),
            "info" => Some(Severity::Info),
            "warn" | "warning" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);
static STDERR_ONLY: AtomicBool = AtomicBool::new(false);

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// ERROR to stderr, everything else to stdout
    Split,
    /// Everything to stderr, leaving stdout to the caller
    Stderr,
}

/// A structured logger that outputs JSON logs
pub struct Logger;

impl Logger {
    /// Set the lowest severity that is written
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Current minimum severity
    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    pub fn set_target(target: LogTarget) {
        STDERR_ONLY.store(target == LogTarget::Stderr, Ordering::Relaxed);
    }

    pub fn target() -> LogTarget {
        if STDERR_ONLY.load(Ordering::Relaxed) {
            LogTarget::Stderr
        } else {
            LogTarget::Split
        }
    }

    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < Self::min_severity() {
            return;
        }
        if severity >= Severity::Error || Self::target() == LogTarget::Stderr {
            Self::log_to_writer(severity, event, fields, &mut io::stderr());
        } else {
            Self::log_to_writer(severity, event, fields, &mut io::stdout());
        }
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        // serde_json's default map is ordered, so keys always come out sorted
        let mut record = Map::new();
        for (key, value) in fields {
            record.insert((*key).to_string(), Value::from(*value));
        }
        record.insert("event".to_string(), Value::from(event));
        record.insert("severity".to_string(), Value::from(severity.as_str()));
        record.insert("ts".to_string(), Value::from(Utc::now().to_rfc3339()));

        let Ok(mut line) = serde_json::to_string(&record) else {
            return;
        };
        line.push('\n');

        // One write per line so concurrent loggers never interleave mid-record
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}
