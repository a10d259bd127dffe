//! Actor Core
//!
//! The scheduling unit behind every actor: a FIFO mailbox, a receiver that
//! processes messages one at a time, and two flags.
//!
//! - `scheduled` is true while an episode for this core is submitted to the
//!   pool and has not yet released. At most one episode is ever pending.
//! - `running` is true while some thread is draining the mailbox. Pool
//!   workers and blocked future waiters race for it; only the winner touches
//!   the receiver.
//!
//! An episode drains a snapshot of the mailbox, releases `scheduled`, then
//! re-checks the mailbox under its lock and reschedules itself if messages
//! slipped in. A message enqueued at any point is therefore always either
//! covered by a pending episode or picked up by the re-check.

use crate::error::{ActorError, Result};
use crate::pool::WorkerPool;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0.simple())
    }
}

/// Per-message behaviour of a core's receiver
pub trait Receive<M>: Send + 'static {
    /// Process one message. Errors are routed to [`on_exception`](Self::on_exception).
    fn receive(&mut self, msg: M) -> Result<()>;

    /// Called with every error or panic raised by `receive`
    fn on_exception(&mut self, error: ActorError) {
        error!(
            error = %error,
            category = error.category(),
            "Unhandled failure while processing actor message"
        );
    }
}

/// Lifecycle hooks fired around each scheduling episode.
///
/// Hooks run on whichever thread drives the episode and must not block.
pub trait CoreListener: Send + Sync + 'static {
    /// After the pool accepted an episode.
    ///
    /// A rejected submission fires nothing, so submits and releases stay
    /// balanced. On an inline pool the episode has already run.
    fn on_submit(&self) {}

    /// After an episode drained the mailbox and released `scheduled`
    fn on_release(&self) {}

    /// After an episode found the mailbox empty on its final re-check
    fn on_empty(&self) {}
}

impl CoreListener for () {}

/// Something a blocked waiter can run on its own thread
pub trait Drainable: Send + Sync {
    /// Process pending work on the calling thread.
    ///
    /// Returns `false` without doing anything when another thread holds
    /// the right to drain.
    fn drain(&self) -> bool;

    /// Whether the backing pool has no spare workers
    fn is_pool_saturated(&self) -> bool;
}

/// Core activity counters
#[derive(Debug, Default)]
pub struct CoreMetrics {
    enqueued: AtomicU64,
    processed: AtomicU64,
    failures: AtomicU64,
    episodes: AtomicU64,
    helped_drains: AtomicU64,
}

/// Core metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStats {
    pub enqueued: u64,
    pub processed: u64,
    pub failures: u64,
    pub episodes: u64,
    pub helped_drains: u64,
}

impl CoreMetrics {
    pub fn snapshot(&self) -> CoreStats {
        CoreStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            episodes: self.episodes.load(Ordering::Relaxed),
            helped_drains: self.helped_drains.load(Ordering::Relaxed),
        }
    }
}

/// Clears a scheduling flag when dropped, even by unwinding
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Mailbox plus scheduling state for one receiver
pub struct ActorCore<M, R, L = ()> {
    id: ActorId,
    queue: Mutex<VecDeque<M>>,
    scheduled: AtomicBool,
    running: AtomicBool,
    /// Only locked by the holder of `running`
    receiver: Mutex<R>,
    listener: L,
    pool: Arc<dyn WorkerPool>,
    metrics: CoreMetrics,
}

impl<M, R, L> ActorCore<M, R, L>
where
    M: Send + 'static,
    R: Receive<M>,
    L: CoreListener,
{
    pub fn new(receiver: R, listener: L, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            id: ActorId::new(),
            queue: Mutex::new(VecDeque::new()),
            scheduled: AtomicBool::new(false),
            running: AtomicBool::new(false),
            receiver: Mutex::new(receiver),
            listener,
            pool,
            metrics: CoreMetrics::default(),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn metrics(&self) -> &CoreMetrics {
        &self.metrics
    }

    /// Messages waiting in the mailbox
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append a message and make sure an episode will process it.
    ///
    /// Fails without queueing when the pool is shut down. If the submission
    /// itself fails the message stays queued for a later episode.
    pub fn enqueue(self: &Arc<Self>, msg: M) -> Result<()> {
        if self.pool.is_shutdown() {
            return Err(ActorError::pool_shutdown(self.pool.stats().strategy.as_str()));
        }
        self.queue.lock().push_back(msg);
        self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
        self.try_schedule()
    }

    /// Submit an episode unless one is already pending
    pub fn try_schedule(self: &Arc<Self>) -> Result<()> {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        trace!(actor_id = %self.id, "Scheduling actor episode");
        let core = Arc::clone(self);
        if let Err(e) = self.pool.submit(Box::new(move || core.run())) {
            self.scheduled.store(false, Ordering::Release);
            return Err(e);
        }
        self.listener.on_submit();
        Ok(())
    }

    /// One scheduling episode, as executed by a pool worker
    pub fn run(self: &Arc<Self>) {
        self.metrics.episodes.fetch_add(1, Ordering::Relaxed);
        {
            let _scheduled = FlagGuard(&self.scheduled);
            self.drain();
        }
        self.listener.on_release();

        let has_more = !self.queue.lock().is_empty();
        if has_more {
            if let Err(e) = self.try_schedule() {
                warn!(
                    actor_id = %self.id,
                    error = %e,
                    queued = self.queue_len(),
                    "Failed to reschedule actor episode"
                );
            }
        } else {
            self.listener.on_empty();
        }
    }

    /// Process the messages queued at the moment of the call.
    ///
    /// Messages arriving during the drain are left for the next episode.
    /// Returns `false` if another thread is already draining.
    pub fn drain(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _running = FlagGuard(&self.running);

        let pending = self.queue.lock().len();
        let mut receiver = self.receiver.lock();
        for _ in 0..pending {
            let Some(msg) = self.queue.lock().pop_front() else {
                break;
            };
            match catch_unwind(AssertUnwindSafe(|| receiver.receive(msg))) {
                Ok(Ok(())) => {
                    self.metrics.processed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(error)) => {
                    self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    self.report(&mut receiver, error);
                }
                Err(payload) => {
                    self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                    self.report(&mut receiver, ActorError::panicked(payload));
                }
            }
        }
        true
    }

    /// Hand a failure to the receiver's handler; a panicking handler is logged
    fn report(&self, receiver: &mut R, failure: ActorError) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| receiver.on_exception(failure))) {
            error!(
                actor_id = %self.id,
                error = %ActorError::panicked(payload),
                "Actor exception handler panicked"
            );
        }
    }

    /// Run `f` against the receiver if no drain is in progress
    pub(crate) fn with_receiver<T>(&self, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _running = FlagGuard(&self.running);
        let mut receiver = self.receiver.lock();
        Some(f(&mut receiver))
    }
}

impl<M, R, L> Drainable for ActorCore<M, R, L>
where
    M: Send + 'static,
    R: Receive<M>,
    L: CoreListener,
{
    fn drain(&self) -> bool {
        let drained = ActorCore::drain(self);
        if drained {
            self.metrics.helped_drains.fetch_add(1, Ordering::Relaxed);
        }
        drained
    }

    fn is_pool_saturated(&self) -> bool {
        self.pool.is_saturated()
    }
}

impl<M, R, L> fmt::Debug for ActorCore<M, R, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCore")
            .field("id", &self.id)
            .field("scheduled", &self.scheduled.load(Ordering::Relaxed))
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
