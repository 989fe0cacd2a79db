//! # Batches
//!
//! A batch runs several units in one queue slot and records them as a
//! single history entry, so one undo reverts all of them.
//!
//! Items run in order. An item may be a handle, or a function that builds
//! a handle from the results of the items before it. A failing item is
//! logged and yields `None`; the batch carries on with the next item.
//! Items that depend on a failed one will usually fail in turn.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::errors::{TxnError, TxnResult};
use super::handle::TxnHandle;
use super::manager::{ManagerShared, TransactionManager};
use super::queue::TaskGuard;
use crate::observability::{log_event, TxnEvent};

/// Builds a handle from the results accumulated so far
pub type DeferredItem = Box<dyn FnOnce(&[Option<Value>]) -> TxnResult<TxnHandle> + Send>;

/// One element of a batch
pub enum BatchItem {
    /// A registered handle
    Unit(TxnHandle),
    /// A handle computed from earlier results, indexed like the items
    Deferred(DeferredItem),
}

impl BatchItem {
    /// Item built from the results of the items before it
    pub fn deferred<F>(build: F) -> Self
    where
        F: FnOnce(&[Option<Value>]) -> TxnResult<TxnHandle> + Send + 'static,
    {
        BatchItem::Deferred(Box::new(build))
    }
}

impl From<TxnHandle> for BatchItem {
    fn from(handle: TxnHandle) -> Self {
        BatchItem::Unit(handle)
    }
}

impl fmt::Debug for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchItem::Unit(handle) => f.debug_tuple("Unit").field(handle).finish(),
            BatchItem::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Inline access to the manager while a batch task holds the queue
pub struct BatchScope {
    shared: Arc<ManagerShared>,
    guard: TaskGuard,
    next_index: usize,
}

impl BatchScope {
    pub(crate) fn new(shared: Arc<ManagerShared>, guard: TaskGuard) -> Self {
        Self {
            shared,
            guard,
            next_index: 0,
        }
    }

    /// Execute a unit as the next member of this batch.
    ///
    /// The first call starts a new history entry, later calls extend it.
    /// Failed calls still consume their index.
    pub async fn transact(&mut self, handle: &TxnHandle) -> TxnResult<Value> {
        let index = self.next_index;
        self.next_index += 1;
        self.transact_at(handle, index).await
    }

    /// Register a unit without leaving the batch
    pub fn manager(&self) -> TransactionManager {
        TransactionManager::from_shared(Arc::clone(&self.shared))
    }

    /// Whether the queue already gave up on this batch
    pub fn is_expired(&self) -> bool {
        self.guard.is_expired()
    }

    async fn transact_at(&self, handle: &TxnHandle, batch_index: usize) -> TxnResult<Value> {
        self.shared.prepare(handle)?;
        self.shared
            .run_transaction(handle.clone(), batch_index == 0, &self.guard)
            .await
    }
}

impl TransactionManager {
    /// Run `items` as one history entry. See [`TransactionManager::batch_named`].
    pub fn batch(&self, items: Vec<BatchItem>) -> BoxFuture<'static, TxnResult<Vec<Option<Value>>>> {
        self.batch_named("batch", items)
    }

    /// Run `items` in order as one history entry.
    ///
    /// Resolves to one result per item, `None` where the item failed.
    /// Item failures never fail the batch; it fails only on invalid input
    /// (empty, or a handle from another manager) or at the queue level.
    pub fn batch_named(
        &self,
        name: &str,
        items: Vec<BatchItem>,
    ) -> BoxFuture<'static, TxnResult<Vec<Option<Value>>>> {
        if items.is_empty() {
            return future::ready(Err(TxnError::invalid_input("batch must not be empty"))).boxed();
        }
        let foreign = items.iter().any(|item| match item {
            BatchItem::Unit(handle) => !self.is_registered(handle),
            BatchItem::Deferred(_) => false,
        });
        if foreign {
            return future::ready(Err(TxnError::invalid_input(
                "batch items must be handles of this manager or functions",
            )))
            .boxed();
        }

        let name = name.to_string();
        log_event(
            TxnEvent::BatchBegin,
            &[("batch", &name), ("items", &items.len().to_string())],
        );

        self.batch_task(move |scope| run_batch(scope, name, items))
    }
}

async fn run_batch(
    scope: BatchScope,
    name: String,
    items: Vec<BatchItem>,
) -> TxnResult<Vec<Option<Value>>> {
    scope.shared.metrics().increment_batches();
    let mut results: Vec<Option<Value>> = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        if scope.is_expired() {
            break;
        }

        let outcome = match item {
            BatchItem::Unit(handle) => scope.transact_at(&handle, index).await,
            BatchItem::Deferred(build) => match build(&results) {
                Ok(handle) => scope.transact_at(&handle, index).await,
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(value) => results.push(Some(value)),
            Err(e) => {
                // TODO: surface item failures to the caller instead of only
                // logging them; dependent items currently see `None`.
                scope.shared.metrics().increment_batch_item_failures();
                log_event(
                    TxnEvent::BatchItemFailed,
                    &[
                        ("batch", &name),
                        ("code", e.code()),
                        ("index", &index.to_string()),
                        ("reason", &e.to_string()),
                    ],
                );
                results.push(None);
            }
        }
    }

    let failed = results.iter().filter(|r| r.is_none()).count();
    log_event(
        TxnEvent::BatchComplete,
        &[("batch", &name), ("failed", &failed.to_string())],
    );
    Ok(results)
}
