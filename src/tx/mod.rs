//! Cooperative cancellation.
//!
//! The storage contract (`storage::StorageBackend`) has no transaction type —
//! every call is independently atomic, so there is nothing here to commit or
//! roll back. What a long-running query execution does need is a way to be
//! told to stop: a `CancellationToken` is threaded through `Graph::execute`,
//! the clause pipeline's per-segment loop, aggregation, and traversal's
//! DFS/BFS inner loops, each checking it between iterations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply-cloned flag that can be raised once to cancel an in-flight
/// query. Checking it costs one relaxed atomic load.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
