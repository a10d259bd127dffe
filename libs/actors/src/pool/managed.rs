//! Managed executor pool
//!
//! Delegates thread management to the blocking pool of a tokio runtime and
//! keeps its own count of in-flight tasks. The runtime may grow past
//! `max_threads`; the limit only feeds saturation reporting.

use super::{execute, PoolStats, Task, WorkerPool};
use crate::config::{PoolConfig, PoolStrategy};
use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

const POOL: &str = "managed";

#[derive(Default)]
struct Counters {
    /// Submitted and not yet finished
    in_flight: AtomicUsize,
    /// Currently executing
    active: AtomicUsize,
    max_queue_depth: AtomicUsize,
    max_concurrent: AtomicUsize,
}

/// Pool backed by `tokio::task::spawn_blocking`
pub struct ManagedPool {
    max_threads: usize,
    handle: Handle,
    /// Present when the pool owns its runtime
    runtime: Mutex<Option<Runtime>>,
    counters: Arc<Counters>,
    submit_count: AtomicU64,
    shutdown: AtomicBool,
}

impl ManagedPool {
    /// Pool owning a dedicated runtime
    pub fn new(max_threads: usize) -> Result<Self> {
        Self::with_config(&PoolConfig::managed(max_threads))
    }

    pub fn with_config(config: &PoolConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| ActorError::spawn(&e))?;
        debug!(max_threads = config.max_threads, "Created managed pool runtime");

        let handle = runtime.handle().clone();
        let mut pool = Self::with_handle(handle, config.max_threads);
        pool.runtime = Mutex::new(Some(runtime));
        Ok(pool)
    }

    /// Pool borrowing the blocking threads of an existing runtime
    pub fn with_handle(handle: Handle, max_threads: usize) -> Self {
        Self {
            max_threads,
            handle,
            runtime: Mutex::new(None),
            counters: Arc::new(Counters::default()),
            submit_count: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Tasks currently executing
    pub fn active_tasks(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }
}

impl WorkerPool for ManagedPool {
    fn submit(&self, task: Task) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            warn!(pool = POOL, "Task rejected after shutdown");
            return Err(ActorError::pool_shutdown(POOL));
        }
        self.submit_count.fetch_add(1, Ordering::Relaxed);

        if self.max_threads == 0 {
            execute(task, POOL);
            return Ok(());
        }

        let counters = Arc::clone(&self.counters);
        let in_flight = counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let queued = in_flight.saturating_sub(counters.active.load(Ordering::Acquire));
        counters.max_queue_depth.fetch_max(queued, Ordering::Relaxed);

        self.handle.spawn_blocking(move || {
            let active = counters.active.fetch_add(1, Ordering::AcqRel) + 1;
            counters.max_concurrent.fetch_max(active, Ordering::Relaxed);
            execute(task, POOL);
            counters.active.fetch_sub(1, Ordering::AcqRel);
            counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        });
        Ok(())
    }

    fn is_saturated(&self) -> bool {
        self.counters.active.load(Ordering::Acquire) >= self.max_threads
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        let stats = self.stats();
        info!(
            in_flight = stats.live_workers,
            submit_count = stats.submit_count,
            max_concurrent_workers = stats.max_concurrent_workers,
            "Managed pool shut down"
        );
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn stats(&self) -> PoolStats {
        let counters = &self.counters;
        PoolStats {
            strategy: PoolStrategy::Managed,
            max_threads: self.max_threads,
            live_workers: counters.in_flight.load(Ordering::Acquire),
            active_tasks: counters.active.load(Ordering::Acquire),
            submit_count: self.submit_count.load(Ordering::Relaxed),
            max_queue_depth: counters.max_queue_depth.load(Ordering::Relaxed),
            max_concurrent_workers: counters.max_concurrent.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ManagedPool {
    fn drop(&mut self) {
        // Dropping a runtime blocks on its blocking threads, which may include
        // the current one.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}
