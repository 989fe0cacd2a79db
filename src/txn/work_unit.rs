//! Work unit contract
//!
//! A work unit is the body of a transaction. The manager calls `execute`
//! at most once, then only ever `undo` and `redo` while the unit sits in
//! the history.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::errors::TxnResult;

/// Boxed future returned by work unit methods
pub type WorkFuture<'a> = Pin<Box<dyn Future<Output = TxnResult<Value>> + Send + 'a>>;

/// A unit of undoable work
///
/// `undo` and `redo` are optional. A unit that returns `None` from `redo`
/// is replayed by calling `execute` again; a unit that returns `None` from
/// `undo` cannot be undone and fails with `NotUndoable`.
pub trait WorkUnit: Send + Sync {
    /// Apply the work
    fn execute(&self) -> WorkFuture<'_>;

    /// Revert the work
    fn undo(&self) -> Option<WorkFuture<'_>> {
        None
    }

    /// Re-apply the work after an undo
    fn redo(&self) -> Option<WorkFuture<'_>> {
        None
    }

    /// Short human-readable description used in logs and entry listings
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Constant;

    impl WorkUnit for Constant {
        fn execute(&self) -> WorkFuture<'_> {
            Box::pin(async { Ok(json!(7)) })
        }

        fn describe(&self) -> String {
            "Constant".to_string()
        }
    }

    #[tokio::test]
    async fn test_optional_methods_default_to_none() {
        let unit = Constant;
        assert!(unit.undo().is_none());
        assert!(unit.redo().is_none());
        assert_eq!(unit.execute().await.unwrap(), json!(7));
    }
}
