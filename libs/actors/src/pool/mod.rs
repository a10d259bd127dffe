//! Worker Pools
//!
//! Execution substrate for actor episodes and stateless tasks. A pool accepts
//! boxed tasks, runs each exactly once, and reports whether it is saturated,
//! i.e. whether every worker it may create is already alive. That flag drives
//! the cooperative helping done by blocked future waiters.
//!
//! Strategies:
//! - [`BoundedPool`]: named OS threads spawned lazily up to a maximum and
//!   retired after a short idle poll
//! - [`ManagedPool`]: the blocking pool of a tokio runtime plus an explicit
//!   busy-task counter
//! - [`InlinePool`]: runs every task on the submitting thread
//!
//! A maximum of zero workers makes the bounded and managed pools behave like
//! the inline pool.

mod bounded;
mod inline;
mod managed;

pub use bounded::BoundedPool;
pub use inline::InlinePool;
pub use managed::ManagedPool;

use crate::config::PoolStrategy;
use crate::error::{panic_message, Result};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Unit of work accepted by a pool
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Execution substrate shared by actors and stateless futures
pub trait WorkerPool: Send + Sync + 'static {
    /// Queue a task for execution, or run it inline for zero-thread pools.
    ///
    /// Fails with [`ActorError::PoolShutdown`](crate::ActorError::PoolShutdown)
    /// once [`shutdown`](Self::shutdown) has been called.
    fn submit(&self, task: Task) -> Result<()>;

    /// True when the pool cannot add another worker.
    ///
    /// This is a heuristic: it counts live workers, not busy ones.
    fn is_saturated(&self) -> bool;

    /// Stop accepting work and abandon queued tasks (best-effort)
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;

    /// Configured worker limit
    fn max_threads(&self) -> usize;

    /// Point-in-time statistics
    fn stats(&self) -> PoolStats;
}

/// Pool statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub strategy: PoolStrategy,
    pub max_threads: usize,
    /// Workers currently alive (bounded) or tasks in flight (managed)
    pub live_workers: usize,
    /// Tasks currently executing
    pub active_tasks: usize,
    /// Tasks accepted since creation or the last statistics reset
    pub submit_count: u64,
    /// High-water mark of queued, not yet started tasks
    pub max_queue_depth: usize,
    /// High-water mark of concurrently live workers
    pub max_concurrent_workers: usize,
}

/// Run a task, containing any panic it raises.
///
/// Returns `false` when the task panicked.
pub(crate) fn execute(task: Task, pool: &'static str) -> bool {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                pool,
                panic = %panic_message(payload.as_ref()),
                "Worker task panicked"
            );
            false
        }
    }
}
