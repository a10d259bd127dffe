//! Futures with cooperative helping
//!
//! An [`ActorFuture`] is the result handle of a `call` on an actor or of a
//! stateless task. Waiting on it is a blocking operation, but before a
//! thread actually parks it tries to make progress itself: while the result
//! is not ready and the pool has no spare workers, it drains the producing
//! actor's mailbox on its own stack. This keeps call chains between actors
//! sharing a small pool from deadlocking when every worker is blocked.
//!
//! The completion side is a [`Promise`]. Dropping a promise without
//! completing it cancels its future, so waiters are never left hanging on a
//! result nobody will produce.

use crate::core::Drainable;
use crate::error::{ActorError, Result};
use crate::pool::WorkerPool;
use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type Listener = Box<dyn FnOnce() + Send + 'static>;

enum Slot<V> {
    Pending,
    Running,
    Done(Result<V>),
    Cancelled,
    Taken,
}

impl<V> Slot<V> {
    fn is_finished(&self) -> bool {
        !matches!(self, Slot::Pending | Slot::Running)
    }
}

struct State<V> {
    slot: Slot<V>,
    listeners: Vec<Listener>,
}

struct Shared<V> {
    state: Mutex<State<V>>,
    ready: Condvar,
}

impl<V> Shared<V> {
    fn new(slot: Slot<V>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                slot,
                listeners: Vec::new(),
            }),
            ready: Condvar::new(),
        })
    }

    /// Move a pending or running slot to a final state and fire listeners
    fn finish(&self, slot: Slot<V>) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            if state.slot.is_finished() {
                return false;
            }
            state.slot = slot;
            self.ready.notify_all();
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners {
            listener();
        }
        true
    }
}

/// Handle to a value produced asynchronously
pub struct ActorFuture<V> {
    shared: Arc<Shared<V>>,
    helper: Option<Arc<dyn Drainable>>,
}

impl<V> Clone for ActorFuture<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            helper: self.helper.clone(),
        }
    }
}

impl<V> fmt::Debug for ActorFuture<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorFuture")
            .field("done", &self.is_done())
            .field("helping", &self.helper.is_some())
            .finish()
    }
}

/// Completion side of an [`ActorFuture`]
pub struct Promise<V> {
    shared: Option<Arc<Shared<V>>>,
}

impl<V: Send + 'static> ActorFuture<V> {
    /// Create an unbound future and its promise.
    ///
    /// Waiting on it never helps; it only blocks.
    pub fn promise() -> (Promise<V>, ActorFuture<V>) {
        Self::with_helper(None)
    }

    /// A future that is already complete
    pub fn ready(value: V) -> Self {
        Self {
            shared: Shared::new(Slot::Done(Ok(value))),
            helper: None,
        }
    }

    /// A future that already failed
    pub fn failed(error: ActorError) -> Self {
        Self {
            shared: Shared::new(Slot::Done(Err(error))),
            helper: None,
        }
    }

    pub(crate) fn with_helper(helper: Option<Arc<dyn Drainable>>) -> (Promise<V>, ActorFuture<V>) {
        let shared = Shared::new(Slot::Pending);
        let promise = Promise {
            shared: Some(Arc::clone(&shared)),
        };
        (promise, ActorFuture { shared, helper })
    }
}

impl<V> ActorFuture<V> {
    /// True once the future completed, failed or was cancelled
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().slot.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.state.lock().slot, Slot::Cancelled)
    }

    /// Cancel the future if it has not completed.
    ///
    /// A task that is already running finishes but its result is discarded.
    pub fn cancel(&self) -> bool {
        let cancelled = self.shared.finish(Slot::Cancelled);
        if cancelled {
            debug!("Future cancelled");
        }
        cancelled
    }

    /// Register a callback fired once on completion.
    ///
    /// Returns `false` without registering when the future is already done.
    pub fn add_listener<F>(&self, listener: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.slot.is_finished() {
            return false;
        }
        state.listeners.push(Box::new(listener));
        true
    }

    /// Drain the producer on this thread while that is useful
    fn help(&self, deadline: Option<Instant>) {
        let Some(helper) = &self.helper else {
            return;
        };
        while !self.is_done() && helper.is_pool_saturated() && helper.drain() {
            trace!("Waiter drained producer mailbox");
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
        }
    }

    /// Block until the future is done, helping first
    pub fn wait(&self) {
        self.help(None);
        let mut state = self.shared.state.lock();
        while !state.slot.is_finished() {
            self.shared.ready.wait(&mut state);
        }
    }

    /// Bounded [`wait`](Self::wait); returns whether the future is done
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        // Past the representable range means no deadline at all
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        self.help(Some(deadline));
        let mut state = self.shared.state.lock();
        while !state.slot.is_finished() {
            if self
                .shared
                .ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.slot.is_finished();
            }
        }
        true
    }

    /// Wait, then move the value out.
    ///
    /// Later `take` or `get` calls on any clone fail with `ResultTaken`.
    pub fn take(&self) -> Result<V> {
        self.wait();
        self.take_finished()
    }

    pub fn take_timeout(&self, timeout: Duration) -> Result<V> {
        if !self.wait_timeout(timeout) {
            return Err(ActorError::timeout(
                "ActorFuture::take_timeout",
                timeout.as_millis() as u64,
            ));
        }
        self.take_finished()
    }

    fn take_finished(&self) -> Result<V> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Done(result) => result,
            Slot::Cancelled => {
                state.slot = Slot::Cancelled;
                Err(ActorError::Cancelled)
            }
            Slot::Taken => Err(ActorError::ResultTaken),
            pending @ (Slot::Pending | Slot::Running) => {
                state.slot = pending;
                Err(ActorError::timeout("ActorFuture::take", 0))
            }
        }
    }

    /// First error of a finished future, if any
    fn failure(&self) -> Option<ActorError> {
        match &self.shared.state.lock().slot {
            Slot::Done(Err(e)) => Some(e.clone()),
            Slot::Cancelled => Some(ActorError::Cancelled),
            _ => None,
        }
    }
}

impl<V: Clone> ActorFuture<V> {
    /// Wait, then return a copy of the value
    pub fn get(&self) -> Result<V> {
        self.wait();
        self.peek()
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<V> {
        if !self.wait_timeout(timeout) {
            return Err(ActorError::timeout(
                "ActorFuture::get_timeout",
                timeout.as_millis() as u64,
            ));
        }
        self.peek()
    }

    /// Non-blocking read of a finished future
    pub fn try_get(&self) -> Option<Result<V>> {
        if self.is_done() {
            Some(self.peek())
        } else {
            None
        }
    }

    fn peek(&self) -> Result<V> {
        match &self.shared.state.lock().slot {
            Slot::Done(result) => result.clone(),
            Slot::Cancelled => Err(ActorError::Cancelled),
            Slot::Taken => Err(ActorError::ResultTaken),
            Slot::Pending | Slot::Running => Err(ActorError::timeout("ActorFuture::get", 0)),
        }
    }
}

impl<V> Promise<V> {
    /// Mark the task as started; `false` means the future was cancelled
    pub fn start(&self) -> bool {
        let Some(shared) = &self.shared else {
            return false;
        };
        let mut state = shared.state.lock();
        match state.slot {
            Slot::Pending => {
                state.slot = Slot::Running;
                true
            }
            Slot::Running => true,
            _ => false,
        }
    }

    /// Complete the future; `false` if it was already cancelled
    pub fn complete(mut self, result: Result<V>) -> bool {
        match self.shared.take() {
            Some(shared) => shared.finish(Slot::Done(result)),
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| matches!(s.state.lock().slot, Slot::Cancelled))
    }
}

impl<V> Drop for Promise<V> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if shared.finish(Slot::Cancelled) {
                debug!("Promise dropped before completion; future cancelled");
            }
        }
    }
}

/// Run a producer into its promise, capturing panics as failures
pub(crate) fn fulfil<V>(promise: Promise<V>, producer: impl FnOnce() -> Result<V>) {
    if !promise.start() {
        return;
    }
    let result = match catch_unwind(AssertUnwindSafe(producer)) {
        Ok(result) => result,
        Err(payload) => Err(ActorError::panicked(payload)),
    };
    promise.complete(result);
}

/// Block until any of the futures is done and return its index.
///
/// No helping is performed here.
pub fn await_any<V>(futures: &[ActorFuture<V>]) -> Result<usize> {
    if futures.is_empty() {
        return Err(ActorError::configuration(
            "await_any requires at least one future",
            None,
        ));
    }
    let (tx, rx) = bounded::<usize>(1);
    for (index, future) in futures.iter().enumerate() {
        let tx = tx.clone();
        future.add_listener(move || {
            let _ = tx.try_send(index);
        });
        if future.is_done() {
            return Ok(index);
        }
    }
    drop(tx);
    rx.recv().map_err(|_| ActorError::Cancelled)
}

/// Wait for every future in order; the first failure is returned
pub fn await_all<V>(futures: &[ActorFuture<V>]) -> Result<()> {
    for future in futures {
        future.wait();
        if let Some(error) = future.failure() {
            return Err(error);
        }
    }
    Ok(())
}

/// One-shot task that can be run by the pool or by a waiter
struct StatelessTask<V> {
    job: Mutex<Option<(Box<dyn FnOnce() -> V + Send>, Promise<V>)>>,
    pool: Arc<dyn WorkerPool>,
}

impl<V: Send + 'static> Drainable for StatelessTask<V> {
    fn drain(&self) -> bool {
        let Some((job, promise)) = self.job.lock().take() else {
            return false;
        };
        fulfil(promise, || Ok(job()));
        true
    }

    fn is_pool_saturated(&self) -> bool {
        self.pool.is_saturated()
    }
}

/// Run a closure on the pool without an actor.
///
/// A waiter that finds the pool saturated runs the closure itself if no
/// worker has picked it up yet.
pub fn spawn_stateless<V, F>(pool: &Arc<dyn WorkerPool>, job: F) -> Result<ActorFuture<V>>
where
    V: Send + 'static,
    F: FnOnce() -> V + Send + 'static,
{
    let (promise, future) = ActorFuture::with_helper(None);
    let task = Arc::new(StatelessTask {
        job: Mutex::new(Some((Box::new(job) as Box<dyn FnOnce() -> V + Send>, promise))),
        pool: Arc::clone(pool),
    });

    let runner = Arc::clone(&task);
    pool.submit(Box::new(move || {
        runner.drain();
    }))?;

    Ok(ActorFuture {
        helper: Some(task as Arc<dyn Drainable>),
        ..future
    })
}
