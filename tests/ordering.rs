//! Queue Ordering Tests
//!
//! Every manager operation goes through one queue:
//! - Start order equals submission order
//! - No two operations overlap
//! - A hung operation is abandoned at the deadline
//! - A failed operation does not affect the ones after it

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::time::Instant;

use txnmgr::{TransactionManager, TxnConfig, TxnError, WorkFuture, WorkUnit};

#[derive(Debug, Clone, Copy)]
struct Span {
    id: usize,
    start: Instant,
    end: Instant,
}

type Timeline = Arc<Mutex<Vec<Span>>>;

/// Sleeps for a while and records when it ran
struct Timed {
    id: usize,
    delay: Duration,
    timeline: Timeline,
}

impl Timed {
    fn record(&self) -> WorkFuture<'_> {
        Box::pin(async move {
            let start = Instant::now();
            tokio::time::sleep(self.delay).await;
            self.timeline.lock().unwrap().push(Span {
                id: self.id,
                start,
                end: Instant::now(),
            });
            Ok(json!(self.id))
        })
    }
}

impl WorkUnit for Timed {
    fn execute(&self) -> WorkFuture<'_> {
        self.record()
    }

    fn undo(&self) -> Option<WorkFuture<'_>> {
        Some(self.record())
    }

    fn describe(&self) -> String {
        format!("Timed({})", self.id)
    }
}

fn assert_serialized(spans: &[Span]) {
    for pair in spans.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "span {} overlaps span {}",
            pair[0].id,
            pair[1].id
        );
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Transactions issued without awaiting start in call order and never overlap.
#[tokio::test(start_paused = true)]
async fn test_start_order_matches_submission_order() {
    let manager = TransactionManager::new(TxnConfig::default()).unwrap();
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));

    // Later submissions are quicker, so any overlap would reorder the spans
    let pending: Vec<_> = (0..8)
        .map(|id| {
            let handle = manager.register(Timed {
                id,
                delay: Duration::from_millis(80 - id as u64 * 10),
                timeline: timeline.clone(),
            });
            manager.transact(&handle)
        })
        .collect();

    let results = join_all(pending).await;

    for (id, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), json!(id));
    }
    let spans = timeline.lock().unwrap().clone();
    let ids: Vec<usize> = spans.iter().map(|s| s.id).collect();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
    assert_serialized(&spans);
    assert_eq!(manager.len(), 8);
}

/// Undo is queued behind the transaction submitted before it.
#[tokio::test(start_paused = true)]
async fn test_undo_waits_for_prior_transaction() {
    let manager = TransactionManager::new(TxnConfig::default()).unwrap();
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let first = manager.register(Timed {
        id: 0,
        delay: Duration::from_millis(50),
        timeline: timeline.clone(),
    });
    let second = manager.register(Timed {
        id: 1,
        delay: Duration::from_millis(5),
        timeline: timeline.clone(),
    });

    let a = manager.transact(&first);
    let b = manager.transact(&second);
    let undo = manager.undo();
    let (a, b, ()) = tokio::join!(a, b, undo);

    a.unwrap();
    b.unwrap();
    let spans = timeline.lock().unwrap().clone();
    let ids: Vec<usize> = spans.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1, 1]);
    assert_serialized(&spans);
    assert_eq!(manager.undo_position(), 1);
}

// =============================================================================
// Timeout
// =============================================================================

struct Hang;

impl WorkUnit for Hang {
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(std::future::pending())
    }

    fn describe(&self) -> String {
        "Hang".to_string()
    }
}

/// A unit that never settles releases the queue at the deadline.
#[tokio::test(start_paused = true)]
async fn test_hung_task_unblocks_queue() {
    let manager =
        TransactionManager::new(TxnConfig::with_timeout(Duration::from_millis(250))).unwrap();
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let hang = manager.register(Hang);
    let next = manager.register(Timed {
        id: 7,
        delay: Duration::from_millis(1),
        timeline: timeline.clone(),
    });

    let began = Instant::now();
    let hung = manager.transact(&hang);
    let after = manager.transact(&next);

    assert_eq!(hung.await, Err(TxnError::Timeout(250)));
    assert_eq!(after.await.unwrap(), json!(7));

    let spans = timeline.lock().unwrap().clone();
    assert!(spans[0].start >= began + Duration::from_millis(250));
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.entry(0).unwrap().describe(), vec!["Timed(7)"]);
    assert_eq!(manager.metrics().queue_timeouts, 1);
}

// =============================================================================
// Failure containment
// =============================================================================

struct Fails;

impl WorkUnit for Fails {
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async { Err(TxnError::execution("disk full")) })
    }

    fn describe(&self) -> String {
        "Fails".to_string()
    }
}

struct Panics;

impl WorkUnit for Panics {
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async {
            if true {
                panic!("unit bug");
            }
            Ok(Value::Null)
        })
    }

    fn describe(&self) -> String {
        "Panics".to_string()
    }
}

struct Ok1;

impl WorkUnit for Ok1 {
    fn execute(&self) -> WorkFuture<'_> {
        Box::pin(async { Ok(Value::from(1)) })
    }

    fn describe(&self) -> String {
        "Ok1".to_string()
    }
}

/// Failures reject only their own submission.
#[tokio::test]
async fn test_failures_are_contained() {
    let manager = TransactionManager::new(TxnConfig::default()).unwrap();
    let fails = manager.register(Fails);
    let panics = manager.register(Panics);
    let ok = manager.register(Ok1);

    let r1 = manager.transact(&fails);
    let r2 = manager.transact(&panics);
    let r3 = manager.transact(&ok);

    assert!(matches!(r1.await, Err(TxnError::ExecutionFailure(m)) if m == "disk full"));
    assert!(matches!(r2.await, Err(TxnError::ExecutionFailure(_))));
    assert_eq!(r3.await.unwrap(), json!(1));
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.metrics().committed, 1);
}
