use super::{execute, PoolStats, Task, WorkerPool};
use crate::config::PoolStrategy;
use crate::error::{ActorError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Synchronous pool: every task runs on the submitting thread.
///
/// Always reports itself saturated, so waiters drain actor queues themselves.
#[derive(Debug, Default)]
pub struct InlinePool {
    submit_count: AtomicU64,
    shutdown: AtomicBool,
}

impl InlinePool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerPool for InlinePool {
    fn submit(&self, task: Task) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ActorError::pool_shutdown("inline"));
        }
        self.submit_count.fetch_add(1, Ordering::Relaxed);
        execute(task, "inline");
        Ok(())
    }

    fn is_saturated(&self) -> bool {
        true
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn max_threads(&self) -> usize {
        0
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            strategy: PoolStrategy::Inline,
            max_threads: 0,
            live_workers: 0,
            active_tasks: 0,
            submit_count: self.submit_count.load(Ordering::Relaxed),
            max_queue_depth: 0,
            max_concurrent_workers: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static RAN_HERE: Cell<bool> = const { Cell::new(false) };
    }

    #[test]
    fn test_runs_on_caller_thread() {
        let pool = InlinePool::new();
        pool.submit(Box::new(|| RAN_HERE.with(|c| c.set(true))))
            .unwrap();
        assert!(RAN_HERE.with(|c| c.get()));
        assert!(pool.is_saturated());
        assert_eq!(pool.stats().submit_count, 1);
    }
}
