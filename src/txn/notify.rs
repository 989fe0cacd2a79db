//! Command state refresh notifications
//!
//! Hosts that show undo/redo availability implement [`CommandStateSink`];
//! the manager calls it after every commit, undo and redo.

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use super::errors::TxnResult;

/// Receiver of "history changed" notifications
pub trait CommandStateSink: Send + Sync {
    /// Refresh whatever depends on undo/redo availability.
    ///
    /// Errors are logged by the caller and otherwise ignored.
    fn refresh_commands(&self) -> TxnResult<()>;
}

/// Sink that ignores notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CommandStateSink for NoopSink {
    fn refresh_commands(&self) -> TxnResult<()> {
        Ok(())
    }
}

/// Sink that counts notifications
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingSink {
    refreshes: AtomicUsize,
}

#[cfg(test)]
impl CountingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far
    pub(crate) fn count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CommandStateSink for CountingSink {
    fn refresh_commands(&self) -> TxnResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
