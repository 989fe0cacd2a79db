//! # Transaction Manager
//!
//! Runs work units through the serialized queue and records them in the
//! history. Every operation that reads or mutates the history (transact,
//! batch, undo, redo, clear) goes through the same queue, so they start in
//! call order and never overlap.
//!
//! Per handle:
//!
//! ```text
//! Created -> Executing -> Committed <-> Undone
//!                      \-> Failed (spent, never in history)
//! ```
//!
//! A handle is marked executed when it is submitted, so it can never be
//! submitted twice, whatever the outcome of the first attempt.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::batch::BatchScope;
use super::errors::{TxnError, TxnResult};
use super::handle::{HandleId, TxnHandle};
use super::history::{HistoryEntry, HistoryStore};
use super::notify::{CommandStateSink, NoopSink};
use super::queue::{SerializedQueue, TaskGuard};
use super::work_unit::WorkUnit;
use crate::config::TxnConfig;
use crate::observability::{log_event, TxnEvent, TxnMetrics, TxnMetricsSnapshot};

/// State shared between a manager, its clones, and its handles
pub(crate) struct ManagerShared {
    config: TxnConfig,
    queue: SerializedQueue,
    history: Mutex<HistoryStore>,
    executed: Mutex<HashSet<HandleId>>,
    sink: Arc<dyn CommandStateSink>,
    metrics: Arc<TxnMetrics>,
}

/// Serialized transaction manager with undo/redo history
///
/// Cloning is cheap; clones share the same queue and history.
#[derive(Clone)]
pub struct TransactionManager {
    shared: Arc<ManagerShared>,
}

impl TransactionManager {
    /// Create a manager and start its queue worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: TxnConfig) -> TxnResult<Self> {
        Self::with_sink(config, Arc::new(NoopSink))
    }

    /// Create a manager that notifies `sink` after every history change
    pub fn with_sink(config: TxnConfig, sink: Arc<dyn CommandStateSink>) -> TxnResult<Self> {
        config.validate()?;

        let metrics = Arc::new(TxnMetrics::new());
        let queue = SerializedQueue::new(
            config.queue_name.clone(),
            config.queue_timeout(),
            Arc::clone(&metrics),
        );

        log_event(
            TxnEvent::ManagerStart,
            &[
                ("queue", &config.queue_name),
                ("timeout_ms", &config.queue_timeout_ms.to_string()),
            ],
        );

        Ok(Self {
            shared: Arc::new(ManagerShared {
                config,
                queue,
                history: Mutex::new(HistoryStore::new()),
                executed: Mutex::new(HashSet::new()),
                sink,
                metrics,
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    /// Active configuration
    pub fn config(&self) -> &TxnConfig {
        &self.shared.config
    }

    /// Counter snapshot
    pub fn metrics(&self) -> TxnMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Tasks queued or running
    pub fn pending(&self) -> usize {
        self.shared.queue.pending()
    }

    /// Wrap a work unit in a handle owned by this manager
    pub fn register<U: WorkUnit + 'static>(&self, unit: U) -> TxnHandle {
        self.register_arc(Arc::new(unit))
    }

    /// Wrap a shared work unit in a handle owned by this manager
    pub fn register_arc(&self, unit: Arc<dyn WorkUnit>) -> TxnHandle {
        let manager = Arc::downgrade(&self.shared);
        self.shared.history().registry_mut().register(unit, manager)
    }

    /// Whether the handle was registered with this manager
    pub fn is_registered(&self, handle: &TxnHandle) -> bool {
        self.shared.history().registry().contains(handle)
    }

    /// Whether the handle was already submitted
    pub fn has_executed(&self, handle: &TxnHandle) -> bool {
        self.shared.executed().contains(&handle.id())
            && self.shared.history().registry().contains(handle)
    }

    /// Execute a unit and record it as a new history entry.
    ///
    /// Resolves to the unit's result. Fails immediately, without queueing,
    /// with `InvalidHandle` for foreign handles, `AlreadyExecuted` for
    /// handles that were submitted before and `QueueClosed` after shutdown.
    /// Only a submission the queue accepted spends the handle.
    pub fn transact(&self, handle: &TxnHandle) -> BoxFuture<'static, TxnResult<Value>> {
        if let Err(e) = self.shared.prepare(handle) {
            return future::ready(Err(e)).boxed();
        }

        let shared = Arc::clone(&self.shared);
        let queued = handle.clone();
        let submitted = self.shared.queue.try_enqueue_guarded(move |guard| async move {
            shared.run_transaction(queued, true, &guard).await
        });

        match submitted {
            Ok(outcome) => outcome,
            Err(e) => {
                // Never queued, so the handle stays unspent
                self.shared.executed().remove(&handle.id());
                future::ready(Err(e)).boxed()
            }
        }
    }

    /// Run an arbitrary task as one queue slot.
    ///
    /// Units submitted through the [`BatchScope`] run inline; the first one
    /// starts a new history entry and the rest extend it. Calling
    /// [`TransactionManager::transact`] from inside the task queues behind the
    /// task itself and can only time out.
    pub fn batch_task<F, Fut, T>(&self, task: F) -> BoxFuture<'static, TxnResult<T>>
    where
        F: FnOnce(BatchScope) -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.shared
            .queue
            .enqueue_guarded(move |guard| task(BatchScope::new(shared, guard)))
    }

    /// Undo the top undo entry, if any.
    ///
    /// Always resolves. If any unit fails to undo, every undo entry is
    /// dropped.
    pub fn undo(&self) -> BoxFuture<'static, ()> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .queue
            .enqueue_guarded(move |guard| async move {
                shared.undo_top(&guard).await;
                Ok(())
            })
            .map(|result| {
                if let Err(e) = result {
                    log_event(
                        TxnEvent::UndoFailed,
                        &[("code", e.code()), ("reason", &e.to_string())],
                    );
                }
            })
            .boxed()
    }

    /// Redo the top redo entry, if any.
    ///
    /// Always resolves. If any unit fails to redo, every redo entry is
    /// dropped.
    pub fn redo(&self) -> BoxFuture<'static, ()> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .queue
            .enqueue_guarded(move |guard| async move {
                shared.redo_top(&guard).await;
                Ok(())
            })
            .map(|result| {
                if let Err(e) = result {
                    log_event(
                        TxnEvent::RedoFailed,
                        &[("code", e.code()), ("reason", &e.to_string())],
                    );
                }
            })
            .boxed()
    }

    /// Clear undo entries, redo entries, or both.
    ///
    /// Fails immediately with `InvalidArgument` when both flags are false.
    pub fn clear_history(&self, undo_entries: bool, redo_entries: bool) -> BoxFuture<'static, TxnResult<()>> {
        if !undo_entries && !redo_entries {
            return future::ready(Err(TxnError::InvalidArgument(
                "either undo_entries or redo_entries should be true".to_string(),
            )))
            .boxed();
        }

        let shared = Arc::clone(&self.shared);
        self.shared.queue.enqueue(move || async move {
            let mut history = shared.history();
            match (undo_entries, redo_entries) {
                (true, true) => history.clear_all_entries(),
                (true, false) => history.clear_undo_entries(),
                _ => history.clear_redo_entries(),
            }
            shared.metrics.increment_history_clears();
            Ok(())
        })
    }

    /// Number of history entries
    pub fn len(&self) -> usize {
        self.shared.history().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.history().is_empty()
    }

    /// Index of the top undo entry; equals `len()` when nothing can be undone
    pub fn undo_position(&self) -> usize {
        self.shared.history().undo_position()
    }

    /// Copy of the entry at `index`; later history changes do not affect it
    pub fn entry(&self, index: usize) -> TxnResult<HistoryEntry> {
        self.shared.history().entry(index).cloned()
    }

    /// Copy of the top undo entry
    pub fn top_undo_entry(&self) -> Option<HistoryEntry> {
        self.shared.history().top_undo_entry().cloned()
    }

    /// Copy of the top redo entry
    pub fn top_redo_entry(&self) -> Option<HistoryEntry> {
        self.shared.history().top_redo_entry().cloned()
    }

    /// Stop accepting work and wait for queued work to finish
    pub async fn shutdown(&self) {
        log_event(
            TxnEvent::ManagerShutdown,
            &[("pending", &self.pending().to_string())],
        );
        self.shared.queue.shutdown().await;
    }
}

impl ManagerShared {
    // Poisoning only means a panic elsewhere; the history itself is always
    // left consistent between statements.
    pub(crate) fn history(&self) -> MutexGuard<'_, HistoryStore> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn executed(&self) -> MutexGuard<'_, HashSet<HandleId>> {
        self.executed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn metrics(&self) -> &TxnMetrics {
        &self.metrics
    }

    /// Check the handle belongs here and spend it
    pub(crate) fn prepare(&self, handle: &TxnHandle) -> TxnResult<()> {
        if !self.history().registry().contains(handle) {
            return Err(TxnError::InvalidHandle);
        }
        if !self.executed().insert(handle.id()) {
            return Err(TxnError::AlreadyExecuted(handle.to_string()));
        }
        Ok(())
    }

    /// Execute a prepared handle and record it on success
    pub(crate) async fn run_transaction(
        &self,
        handle: TxnHandle,
        force_new_entry: bool,
        guard: &TaskGuard,
    ) -> TxnResult<Value> {
        guard.check()?;
        let unit = self.history().registry().resolve(&handle)?;
        let description = handle.to_string();

        log_event(TxnEvent::TxnExecute, &[("txn", &description)]);

        let value = match unit.execute().await {
            Ok(value) => value,
            Err(e) => {
                self.metrics.increment_failed();
                log_event(
                    TxnEvent::TxnFailed,
                    &[("code", e.code()), ("reason", &e.to_string()), ("txn", &description)],
                );
                return Err(e);
            }
        };

        if guard.is_expired() {
            log_event(TxnEvent::TxnDiscarded, &[("txn", &description)]);
        }
        guard.check()?;

        self.history().add(handle, force_new_entry)?;
        self.metrics.increment_committed();
        log_event(TxnEvent::TxnCommit, &[("txn", &description)]);
        self.notify();

        Ok(value)
    }

    async fn undo_top(&self, guard: &TaskGuard) {
        log_event(TxnEvent::UndoBegin, &[]);

        let entry = self.history().top_undo_entry().cloned();
        let Some(entry) = entry else {
            return;
        };

        for handle in entry.iter() {
            if guard.is_expired() {
                log_event(TxnEvent::TxnDiscarded, &[("operation", "undo")]);
                return;
            }
            if let Err(e) = self.undo_one(handle).await {
                self.metrics.increment_undo_failures();
                log_event(
                    TxnEvent::UndoFailed,
                    &[
                        ("code", e.code()),
                        ("reason", &e.to_string()),
                        ("txn", &handle.to_string()),
                    ],
                );
                if !guard.is_expired() {
                    self.history().clear_undo_entries();
                }
                return;
            }
        }

        if guard.is_expired() {
            log_event(TxnEvent::TxnDiscarded, &[("operation", "undo")]);
            return;
        }

        self.history().mark_undone();
        self.metrics.increment_undone();
        log_event(TxnEvent::UndoComplete, &[("entry_size", &entry.len().to_string())]);
        self.notify();
    }

    async fn undo_one(&self, handle: &TxnHandle) -> TxnResult<()> {
        let unit = self.history().registry().resolve(handle)?;
        let fut = unit
            .undo()
            .ok_or_else(|| TxnError::NotUndoable(handle.to_string()))?;
        fut.await.map(|_| ())
    }

    async fn redo_top(&self, guard: &TaskGuard) {
        log_event(TxnEvent::RedoBegin, &[]);

        let entry = self.history().top_redo_entry().cloned();
        let Some(entry) = entry else {
            return;
        };

        // Oldest of the entry first: the order the units originally ran in
        for handle in entry.iter().rev() {
            if guard.is_expired() {
                log_event(TxnEvent::TxnDiscarded, &[("operation", "redo")]);
                return;
            }
            if let Err(e) = self.redo_one(handle).await {
                self.metrics.increment_redo_failures();
                log_event(
                    TxnEvent::RedoFailed,
                    &[
                        ("code", e.code()),
                        ("reason", &e.to_string()),
                        ("txn", &handle.to_string()),
                    ],
                );
                if !guard.is_expired() {
                    self.history().clear_redo_entries();
                }
                return;
            }
        }

        if guard.is_expired() {
            log_event(TxnEvent::TxnDiscarded, &[("operation", "redo")]);
            return;
        }

        self.history().mark_redone();
        self.metrics.increment_redone();
        log_event(TxnEvent::RedoComplete, &[("entry_size", &entry.len().to_string())]);
        self.notify();
    }

    async fn redo_one(&self, handle: &TxnHandle) -> TxnResult<()> {
        let unit = self.history().registry().resolve(handle)?;
        let fut = match unit.redo() {
            Some(fut) => fut,
            None => unit.execute(),
        };
        fut.await.map(|_| ())
    }

    fn notify(&self) {
        if let Err(e) = self.sink.refresh_commands() {
            log_event(
                TxnEvent::CommandRefreshFailed,
                &[("reason", &e.to_string())],
            );
        }
    }
}
