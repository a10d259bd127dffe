//! Common Test Utilities
//!
//! Shared helpers for the integration suites: tracing setup, pool builders
//! and a pool wrapper that checks scheduling invariants.

#![allow(dead_code)]

use pool_actors::{PoolConfig, PoolStats, Result, Task, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Initialize tracing for tests (call once per test)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init();
}

pub fn bounded_pool(threads: usize) -> Arc<dyn WorkerPool> {
    PoolConfig::bounded(threads)
        .build()
        .expect("bounded pool config is valid")
}

pub fn managed_pool(threads: usize) -> Arc<dyn WorkerPool> {
    PoolConfig::managed(threads)
        .build()
        .expect("managed pool config is valid")
}

/// Poll `done` until it holds or `limit` elapses
pub fn eventually(mut done: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

/// Pool wrapper tracking how many tasks are submitted but not yet started
pub struct CountingPool {
    inner: Arc<dyn WorkerPool>,
    pending: Arc<AtomicUsize>,
    max_pending: Arc<AtomicUsize>,
}

impl CountingPool {
    pub fn new(inner: Arc<dyn WorkerPool>) -> Self {
        Self {
            inner,
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending.load(Ordering::SeqCst)
    }
}

impl WorkerPool for CountingPool {
    fn submit(&self, task: Task) -> Result<()> {
        let pending = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_pending.fetch_max(pending, Ordering::SeqCst);
        let counter = Arc::clone(&self.pending);
        self.inner.submit(Box::new(move || {
            counter.fetch_sub(1, Ordering::SeqCst);
            task();
        }))
    }

    fn is_saturated(&self) -> bool {
        self.inner.is_saturated()
    }

    fn shutdown(&self) {
        self.inner.shutdown()
    }

    fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    fn max_threads(&self) -> usize {
        self.inner.max_threads()
    }

    fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}
