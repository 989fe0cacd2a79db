//! # Serialized Queue
//!
//! Single-flight FIFO task runner.
//!
//! Tasks are sent over an unbounded channel to one worker task that runs
//! them to completion, one at a time, in submission order. Each task races a
//! fixed deadline. On timeout the worker moves on; the task itself keeps
//! running detached and its eventual outcome is only logged.
//!
//! Work that must not take effect after its slot expired checks the
//! [`TaskGuard`] handed to it before mutating shared state.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::errors::{TxnError, TxnResult};
use crate::observability::{log_event, TxnEvent, TxnMetrics};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Expiry flag for one queued task
#[derive(Debug, Clone)]
pub struct TaskGuard {
    expired: Arc<AtomicBool>,
    timeout_ms: u64,
}

impl TaskGuard {
    fn new(timeout_ms: u64) -> Self {
        Self {
            expired: Arc::new(AtomicBool::new(false)),
            timeout_ms,
        }
    }

    fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    /// Whether the queue already gave up on this task
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// Fail with `Timeout` if the queue already gave up on this task
    pub fn check(&self) -> TxnResult<()> {
        if self.is_expired() {
            Err(TxnError::Timeout(self.timeout_ms))
        } else {
            Ok(())
        }
    }
}

/// Ordered task queue with a per-task deadline
pub struct SerializedQueue {
    name: String,
    timeout: Duration,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    metrics: Arc<TxnMetrics>,
}

impl SerializedQueue {
    /// Create a queue and spawn its worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>, timeout: Duration, metrics: Arc<TxnMetrics>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(rx));

        Self {
            name: name.into(),
            timeout,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            pending: Arc::new(AtomicUsize::new(0)),
            metrics,
        }
    }

    /// Queue name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-task deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tasks submitted but not yet settled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether the queue still accepts tasks
    pub fn is_open(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Enqueue a task.
    ///
    /// The task is submitted before this returns; the returned future only
    /// waits for its outcome.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> BoxFuture<'static, TxnResult<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue_guarded(move |_guard| task())
    }

    /// Enqueue a task that receives its expiry guard.
    pub fn enqueue_guarded<F, Fut, T>(&self, task: F) -> BoxFuture<'static, TxnResult<T>>
    where
        F: FnOnce(TaskGuard) -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.try_enqueue_guarded(task) {
            Ok(outcome) => outcome,
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }

    /// Like [`SerializedQueue::enqueue_guarded`], but reports a closed queue
    /// before returning instead of through the future.
    pub fn try_enqueue_guarded<F, Fut, T>(
        &self,
        task: F,
    ) -> TxnResult<BoxFuture<'static, TxnResult<T>>>
    where
        F: FnOnce(TaskGuard) -> Fut + Send + 'static,
        Fut: Future<Output = TxnResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<TxnResult<T>>();

        let timeout = self.timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let name = self.name.clone();
        let metrics = Arc::clone(&self.metrics);
        let pending = Arc::clone(&self.pending);

        let job: Job = Box::pin(async move {
            let guard = TaskGuard::new(timeout_ms);
            let mut work = tokio::spawn(task(guard.clone()));

            let outcome = match tokio::time::timeout(timeout, &mut work).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(TxnError::execution(format!(
                    "queued task aborted: {}",
                    join_err
                ))),
                Err(_) => {
                    guard.expire();
                    metrics.increment_queue_timeouts();
                    log_event(
                        TxnEvent::QueueTimeout,
                        &[("queue", &name), ("timeout_ms", &timeout_ms.to_string())],
                    );
                    tokio::spawn(observe_late_settlement(
                        work,
                        name.clone(),
                        Arc::clone(&metrics),
                    ));
                    Err(TxnError::Timeout(timeout_ms))
                }
            };

            if let Err(ref e) = outcome {
                log_event(
                    TxnEvent::QueueTaskFailed,
                    &[("code", e.code()), ("queue", &name), ("reason", &e.to_string())],
                );
            }

            pending.fetch_sub(1, Ordering::SeqCst);
            // The caller may have dropped its future; nothing to report then
            let _ = reply_tx.send(outcome);
        });

        let submitted = match self.sender.lock() {
            Ok(sender) => match sender.as_ref() {
                Some(tx) => {
                    self.pending.fetch_add(1, Ordering::SeqCst);
                    if tx.send(job).is_err() {
                        self.pending.fetch_sub(1, Ordering::SeqCst);
                        false
                    } else {
                        true
                    }
                }
                None => false,
            },
            Err(_) => false,
        };

        if !submitted {
            return Err(TxnError::QueueClosed);
        }

        log_event(TxnEvent::QueueEnqueue, &[("queue", &self.name)]);

        Ok(async move { reply_rx.await.unwrap_or(Err(TxnError::QueueClosed)) }.boxed())
    }

    /// Stop accepting tasks, drain the ones already queued, join the worker.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);

        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl std::fmt::Debug for SerializedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedQueue")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("pending", &self.pending())
            .finish()
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        job.await;
    }
}

async fn observe_late_settlement<T>(
    work: JoinHandle<TxnResult<T>>,
    queue: String,
    metrics: Arc<TxnMetrics>,
) {
    let outcome = match work.await {
        Ok(Ok(_)) => "ok".to_string(),
        Ok(Err(e)) => e.code().to_string(),
        Err(join_err) => format!("aborted: {}", join_err),
    };
    metrics.increment_late_settlements();
    log_event(
        TxnEvent::QueueLateSettlement,
        &[("outcome", &outcome), ("queue", &queue)],
    );
}
