//! Actor References
//!
//! [`ActorRef`] wraps any `Send` value into an actor: closures sent to the
//! reference are queued and later run against the value, one at a time and
//! in send order, on some pool thread. Results come back as
//! [`ActorFuture`]s.
//!
//! ```rust
//! use pool_actors::{ActorRef, Actor, PoolConfig};
//!
//! #[derive(Default)]
//! struct Counter {
//!     total: u64,
//! }
//!
//! impl Actor for Counter {}
//!
//! let pool = PoolConfig::bounded(2).build().unwrap();
//! let counter = ActorRef::spawn(&pool, Counter::default());
//! for n in 1..=10 {
//!     counter.send(move |c| c.total += n).unwrap();
//! }
//! let total = counter.call(|c| c.total).unwrap().get().unwrap();
//! assert_eq!(total, 55);
//! ```

use crate::core::{ActorCore, ActorId, CoreStats, Drainable, Receive};
use crate::error::{ActorError, Result};
use crate::future::{fulfil, ActorFuture};
use crate::pool::WorkerPool;
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error};

/// State owned by an actor
pub trait Actor: Send + Sized + 'static {
    /// Called once at spawn with a weak reference to the actor itself
    fn bind(&mut self, _me: WeakActorRef<Self>) {}

    /// Failure raised by a message sent with `send` or `send_fallible`
    fn handle_error(&mut self, error: ActorError) {
        error!(
            actor_type = type_name::<Self>(),
            error = %error,
            category = error.category(),
            "Actor message failed"
        );
    }
}

type Envelope<A> = Box<dyn FnOnce(&mut A) -> Result<()> + Send>;

struct Host<A> {
    actor: A,
}

impl<A: Actor> Receive<Envelope<A>> for Host<A> {
    fn receive(&mut self, msg: Envelope<A>) -> Result<()> {
        msg(&mut self.actor)
    }

    fn on_exception(&mut self, error: ActorError) {
        self.actor.handle_error(error);
    }
}

type Core<A> = ActorCore<Envelope<A>, Host<A>>;

/// Shared handle to an actor
pub struct ActorRef<A: Actor> {
    core: Arc<Core<A>>,
}

impl<A: Actor> Clone for ActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: Actor> PartialEq for ActorRef<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl<A: Actor> Eq for ActorRef<A> {}

impl<A: Actor> fmt::Debug for ActorRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", self.core.id())
            .field("actor_type", &type_name::<A>())
            .field("queued", &self.core.queue_len())
            .finish()
    }
}

impl<A: Actor> ActorRef<A> {
    /// Turn `actor` into an actor scheduled on `pool`
    pub fn spawn(pool: &Arc<dyn WorkerPool>, actor: A) -> Self {
        let core = Arc::new(ActorCore::new(Host { actor }, (), Arc::clone(pool)));
        let me = Self { core };
        let weak = me.downgrade();
        me.core.with_receiver(|host| host.actor.bind(weak));
        debug!(
            actor_id = %me.id(),
            actor_type = type_name::<A>(),
            "Spawned actor"
        );
        me
    }

    pub fn spawn_with<F>(pool: &Arc<dyn WorkerPool>, factory: F) -> Self
    where
        F: FnOnce() -> A,
    {
        Self::spawn(pool, factory())
    }

    pub fn spawn_default(pool: &Arc<dyn WorkerPool>) -> Self
    where
        A: Default,
    {
        Self::spawn(pool, A::default())
    }

    pub fn id(&self) -> &ActorId {
        self.core.id()
    }

    pub fn pool(&self) -> &Arc<dyn WorkerPool> {
        self.core.pool()
    }

    /// Messages waiting to be processed
    pub fn queue_len(&self) -> usize {
        self.core.queue_len()
    }

    pub fn stats(&self) -> CoreStats {
        self.core.metrics().snapshot()
    }

    pub fn downgrade(&self) -> WeakActorRef<A> {
        WeakActorRef {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Fire-and-forget message; panics go to [`Actor::handle_error`]
    pub fn send<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        self.core.enqueue(Box::new(move |actor: &mut A| {
            f(actor);
            Ok(())
        }))
    }

    /// Fire-and-forget message whose error goes to [`Actor::handle_error`]
    pub fn send_fallible<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut A) -> Result<()> + Send + 'static,
    {
        self.core.enqueue(Box::new(f))
    }

    /// Message with a result; failures and panics are delivered through the
    /// future instead of [`Actor::handle_error`]
    pub fn call<V, F>(&self, f: F) -> Result<ActorFuture<V>>
    where
        V: Send + 'static,
        F: FnOnce(&mut A) -> V + Send + 'static,
    {
        self.try_call(move |actor| Ok(f(actor)))
    }

    pub fn try_call<V, F>(&self, f: F) -> Result<ActorFuture<V>>
    where
        V: Send + 'static,
        F: FnOnce(&mut A) -> Result<V> + Send + 'static,
    {
        let helper: Arc<dyn Drainable> = self.core.clone();
        let (promise, future) = ActorFuture::with_helper(Some(helper));
        self.core.enqueue(Box::new(move |actor: &mut A| {
            fulfil(promise, || f(actor));
            Ok(())
        }))?;
        Ok(future)
    }

    /// Wait until every message sent before this call has been processed.
    ///
    /// `None` waits without limit. Returns `false` on timeout.
    pub fn await_messages(&self, timeout: Option<Duration>) -> Result<bool> {
        let marker = self.call(|_| ())?;
        Ok(match timeout {
            Some(timeout) => marker.wait_timeout(timeout),
            None => {
                marker.wait();
                true
            }
        })
    }
}

/// Non-owning actor handle, typically held by the actor itself
pub struct WeakActorRef<A: Actor> {
    core: Weak<Core<A>>,
}

impl<A: Actor> Clone for WeakActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<A: Actor> WeakActorRef<A> {
    pub fn upgrade(&self) -> Option<ActorRef<A>> {
        self.core.upgrade().map(|core| ActorRef { core })
    }
}

impl<A: Actor> fmt::Debug for WeakActorRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakActorRef")
            .field("actor_type", &type_name::<A>())
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}
