//! Observable transaction manager events
//!
//! Events are explicit and typed; the string form is what appears in the
//! `event` key of a log line.

use std::fmt;

use super::logger::Severity;

/// Observable events of the transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnEvent {
    // Lifecycle
    /// Manager constructed and worker running
    ManagerStart,
    /// Shutdown requested
    ManagerShutdown,
    /// Configuration loaded from disk
    ConfigLoaded,

    // Queue
    /// Task placed on the queue
    QueueEnqueue,
    /// Task exceeded its deadline
    QueueTimeout,
    /// Task settled after its deadline had already fired
    QueueLateSettlement,
    /// Task failed; the queue keeps running
    QueueTaskFailed,

    // Transactions
    /// Transaction execution starts
    TxnExecute,
    /// Transaction executed and recorded in history
    TxnCommit,
    /// Transaction execution failed; history untouched
    TxnFailed,
    /// Execution finished after the queue slot expired; not recorded
    TxnDiscarded,

    // History
    /// Handle added to history
    HistoryAdd,
    /// Undo entries removed
    HistoryClearUndo,
    /// Redo entries removed
    HistoryClearRedo,
    /// All entries removed
    HistoryClearAll,

    // Undo / redo
    /// Undo of top entry begins
    UndoBegin,
    /// Undo completed
    UndoComplete,
    /// Undo failed; undo entries cleared
    UndoFailed,
    /// Redo of top entry begins
    RedoBegin,
    /// Redo completed
    RedoComplete,
    /// Redo failed; redo entries cleared
    RedoFailed,

    // Batches
    /// Batch submitted
    BatchBegin,
    /// One batch item failed; batch continues
    BatchItemFailed,
    /// Batch finished
    BatchComplete,

    /// Command state refresh sink failed
    CommandRefreshFailed,
}

impl TxnEvent {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnEvent::ManagerStart => "TXN_MANAGER_START",
            TxnEvent::ManagerShutdown => "TXN_MANAGER_SHUTDOWN",
            TxnEvent::ConfigLoaded => "CONFIG_LOADED",

            TxnEvent::QueueEnqueue => "TXN_QUEUE_ENQUEUE",
            TxnEvent::QueueTimeout => "TXN_QUEUE_TIMEOUT",
            TxnEvent::QueueLateSettlement => "TXN_QUEUE_LATE_SETTLEMENT",
            TxnEvent::QueueTaskFailed => "TXN_QUEUE_TASK_FAILED",

            TxnEvent::TxnExecute => "TXN_EXECUTE",
            TxnEvent::TxnCommit => "TXN_COMMIT",
            TxnEvent::TxnFailed => "TXN_FAILED",
            TxnEvent::TxnDiscarded => "TXN_DISCARDED",

            TxnEvent::HistoryAdd => "HISTORY_ADD",
            TxnEvent::HistoryClearUndo => "HISTORY_CLEAR_UNDO",
            TxnEvent::HistoryClearRedo => "HISTORY_CLEAR_REDO",
            TxnEvent::HistoryClearAll => "HISTORY_CLEAR_ALL",

            TxnEvent::UndoBegin => "UNDO_BEGIN",
            TxnEvent::UndoComplete => "UNDO_COMPLETE",
            TxnEvent::UndoFailed => "UNDO_FAILED",
            TxnEvent::RedoBegin => "REDO_BEGIN",
            TxnEvent::RedoComplete => "REDO_COMPLETE",
            TxnEvent::RedoFailed => "REDO_FAILED",

            TxnEvent::BatchBegin => "BATCH_BEGIN",
            TxnEvent::BatchItemFailed => "BATCH_ITEM_FAILED",
            TxnEvent::BatchComplete => "BATCH_COMPLETE",

            TxnEvent::CommandRefreshFailed => "COMMAND_REFRESH_FAILED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            TxnEvent::QueueEnqueue
            | TxnEvent::TxnExecute
            | TxnEvent::HistoryAdd
            | TxnEvent::HistoryClearUndo
            | TxnEvent::HistoryClearRedo
            | TxnEvent::HistoryClearAll
            | TxnEvent::UndoBegin
            | TxnEvent::RedoBegin => Severity::Trace,
            TxnEvent::QueueLateSettlement
            | TxnEvent::TxnDiscarded
            | TxnEvent::CommandRefreshFailed => Severity::Warn,
            TxnEvent::QueueTimeout
            | TxnEvent::QueueTaskFailed
            | TxnEvent::TxnFailed
            | TxnEvent::UndoFailed
            | TxnEvent::RedoFailed
            | TxnEvent::BatchItemFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for TxnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake_case() {
        let events = [
            TxnEvent::ManagerStart,
            TxnEvent::QueueTimeout,
            TxnEvent::QueueLateSettlement,
            TxnEvent::TxnCommit,
            TxnEvent::HistoryClearRedo,
            TxnEvent::UndoFailed,
            TxnEvent::BatchItemFailed,
            TxnEvent::CommandRefreshFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
            assert_eq!(event.to_string(), s);
        }
    }

    #[test]
    fn test_failures_log_as_errors() {
        assert_eq!(TxnEvent::UndoFailed.severity(), Severity::Error);
        assert_eq!(TxnEvent::QueueTimeout.severity(), Severity::Error);
        assert_eq!(TxnEvent::TxnCommit.severity(), Severity::Info);
        assert_eq!(TxnEvent::QueueEnqueue.severity(), Severity::Trace);
    }
}
