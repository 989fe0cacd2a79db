//! Observability for the transaction manager
//!
//! - Structured logging (JSON, one event per line)
//! - Typed lifecycle events
//! - Monotonic counters
//!
//! ```ignore
//! use txnmgr::observability::{log_event, TxnEvent};
//!
//! log_event(TxnEvent::TxnCommit, &[("txn", "Put(a)")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::TxnEvent;
pub use logger::{LogTarget, Logger, Severity};
pub use metrics::{TxnMetrics, TxnMetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: TxnEvent, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // Only verifies no panic
        log_event(TxnEvent::ManagerStart, &[]);
        log_event(TxnEvent::UndoFailed, &[("reason", "boom")]);
    }
}
