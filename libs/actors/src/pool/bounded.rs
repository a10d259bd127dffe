//! Bounded thread pool
//!
//! Workers are plain named OS threads pulling from one shared unbounded
//! channel. A worker is spawned on submission while fewer than `max_threads`
//! are alive and retires after polling an empty queue for `idle_timeout`.
//! Worker count therefore follows load and drops to zero when quiet.

use super::{execute, PoolStats, Task, WorkerPool};
use crate::config::{PoolConfig, PoolStrategy};
use crate::error::{ActorError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const POOL: &str = "bounded";

/// Thread pool with lazy worker creation and idle retirement
pub struct BoundedPool {
    inner: Arc<Inner>,
}

struct Inner {
    max_threads: usize,
    idle_timeout: Duration,
    thread_name: String,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    /// Serializes the live-count check with worker creation and retirement
    spawn_lock: Mutex<()>,
    live_workers: AtomicUsize,
    active_tasks: AtomicUsize,
    next_worker_id: AtomicU64,
    shutdown: AtomicBool,
    submit_count: AtomicU64,
    max_queue_depth: AtomicUsize,
    max_concurrent_workers: AtomicUsize,
    #[cfg(test)]
    fail_spawns: AtomicBool,
}

impl BoundedPool {
    /// Pool with `max_threads` workers and a 5ms idle poll
    pub fn new(max_threads: usize) -> Self {
        Self::with_config(&PoolConfig::bounded(max_threads))
    }

    pub fn with_config(config: &PoolConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            inner: Arc::new(Inner {
                max_threads: config.max_threads,
                idle_timeout: config.idle_timeout(),
                thread_name: config.thread_name.clone(),
                sender,
                receiver,
                spawn_lock: Mutex::new(()),
                live_workers: AtomicUsize::new(0),
                active_tasks: AtomicUsize::new(0),
                next_worker_id: AtomicU64::new(0),
                shutdown: AtomicBool::new(false),
                submit_count: AtomicU64::new(0),
                max_queue_depth: AtomicUsize::new(0),
                max_concurrent_workers: AtomicUsize::new(0),
                #[cfg(test)]
                fail_spawns: AtomicBool::new(false),
            }),
        }
    }

    /// Number of tasks waiting for a worker
    pub fn queue_depth(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn live_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::Acquire)
    }

    /// Reset submission count and high-water marks
    pub fn reset_statistics(&self) {
        self.inner.submit_count.store(0, Ordering::Relaxed);
        self.inner.max_queue_depth.store(0, Ordering::Relaxed);
        self.inner
            .max_concurrent_workers
            .store(self.live_workers(), Ordering::Relaxed);
    }
}

impl Inner {
    /// Spawn one more worker if below the limit
    fn ensure_worker(self: &Arc<Self>) -> Result<()> {
        let _guard = self.spawn_lock.lock();
        let live = self.live_workers.load(Ordering::Acquire);
        if live >= self.max_threads {
            return Ok(());
        }
        self.live_workers.store(live + 1, Ordering::Release);
        self.max_concurrent_workers
            .fetch_max(live + 1, Ordering::Relaxed);

        let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let spawned = self.spawn_worker(worker_id);

        match spawned {
            Ok(_) => {
                debug!(worker_id, live_workers = live + 1, "Spawned pool worker");
                Ok(())
            }
            Err(e) => {
                self.live_workers.store(live, Ordering::Release);
                error!(worker_id, error = %e, "Failed to spawn pool worker");
                Err(ActorError::spawn(&e))
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>, worker_id: u64) -> std::io::Result<thread::JoinHandle<()>> {
        #[cfg(test)]
        if self.fail_spawns.load(Ordering::Acquire) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "thread limit reached",
            ));
        }
        let inner = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-{}", self.thread_name, worker_id))
            .spawn(move || inner.worker_loop(worker_id))
    }

    fn worker_loop(self: Arc<Self>, worker_id: u64) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            match self.receiver.recv_timeout(self.idle_timeout) {
                Ok(task) => {
                    self.active_tasks.fetch_add(1, Ordering::AcqRel);
                    let completed = execute(task, POOL);
                    self.active_tasks.fetch_sub(1, Ordering::AcqRel);
                    if !completed {
                        // Replaced lazily by the next submission
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let remaining = {
            let _guard = self.spawn_lock.lock();
            self.live_workers.fetch_sub(1, Ordering::AcqRel) - 1
        };
        if remaining == 0 {
            debug!(worker_id, "Last pool worker retired, pool idle");
        } else {
            trace!(worker_id, live_workers = remaining, "Pool worker retired");
        }

        // A submission that saw a full pool just before this worker left
        // would otherwise sit in the queue with nobody to run it.
        if !self.shutdown.load(Ordering::Acquire) && !self.receiver.is_empty() {
            if let Err(e) = self.ensure_worker() {
                error!(error = %e, "Failed to replace retiring pool worker");
            }
        }
    }
}

impl WorkerPool for BoundedPool {
    fn submit(&self, task: Task) -> Result<()> {
        let inner = &self.inner;
        if inner.shutdown.load(Ordering::Acquire) {
            warn!(pool = POOL, "Task rejected after shutdown");
            return Err(ActorError::pool_shutdown(POOL));
        }
        inner.submit_count.fetch_add(1, Ordering::Relaxed);

        if inner.max_threads == 0 {
            execute(task, POOL);
            return Ok(());
        }

        inner
            .sender
            .send(task)
            .map_err(|_| ActorError::pool_shutdown(POOL))?;
        inner
            .max_queue_depth
            .fetch_max(inner.receiver.len(), Ordering::Relaxed);
        // The task is queued either way; a failed spawn is retried by the
        // next submission or a retiring worker.
        if let Err(e) = inner.ensure_worker() {
            warn!(
                pool = POOL,
                error = %e,
                live_workers = inner.live_workers.load(Ordering::Acquire),
                queue_depth = inner.receiver.len(),
                "Task queued without a new worker"
            );
        }
        Ok(())
    }

    fn is_saturated(&self) -> bool {
        self.live_workers() >= self.inner.max_threads
    }

    fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let abandoned = self.inner.receiver.try_iter().count();
        let stats = self.stats();
        info!(
            abandoned_tasks = abandoned,
            live_workers = stats.live_workers,
            submit_count = stats.submit_count,
            max_queue_depth = stats.max_queue_depth,
            max_concurrent_workers = stats.max_concurrent_workers,
            "Bounded pool shut down"
        );
    }

    fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    fn max_threads(&self) -> usize {
        self.inner.max_threads
    }

    fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        PoolStats {
            strategy: PoolStrategy::Bounded,
            max_threads: inner.max_threads,
            live_workers: inner.live_workers.load(Ordering::Acquire),
            active_tasks: inner.active_tasks.load(Ordering::Acquire),
            submit_count: inner.submit_count.load(Ordering::Relaxed),
            max_queue_depth: inner.max_queue_depth.load(Ordering::Relaxed),
            max_concurrent_workers: inner.max_concurrent_workers.load(Ordering::Relaxed),
        }
    }
}

impl Drop for BoundedPool {
    fn drop(&mut self) {
        // Idle workers notice within one poll
        self.inner.shutdown.store(true, Ordering::Release);
    }
}
