//! Typed adapters over actor references
//!
//! - [`SendProxy`] / [`CallProxy`]: a fixed method of an actor exposed as a
//!   plain `send(value)` / `call(value)` handle
//! - [`TypedActor`]: an actor built from a single receive function
//! - [`ActorRef::send_reply`]: call one actor and deliver the result to
//!   another as a message

use crate::actor::{Actor, ActorRef};
use crate::error::Result;
use crate::future::ActorFuture;
use crate::pool::WorkerPool;
use std::marker::PhantomData;
use std::sync::Arc;

/// Fire-and-forget handle bound to one actor method
pub struct SendProxy<A: Actor, T> {
    target: ActorRef<A>,
    act: Arc<dyn Fn(&mut A, T) + Send + Sync>,
}

impl<A: Actor, T: Send + 'static> SendProxy<A, T> {
    pub fn new<F>(target: ActorRef<A>, act: F) -> Self
    where
        F: Fn(&mut A, T) + Send + Sync + 'static,
    {
        Self {
            target,
            act: Arc::new(act),
        }
    }

    pub fn send(&self, value: T) -> Result<()> {
        let act = Arc::clone(&self.act);
        self.target.send(move |actor| act(actor, value))
    }

    pub fn target(&self) -> &ActorRef<A> {
        &self.target
    }
}

impl<A: Actor, T> Clone for SendProxy<A, T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            act: Arc::clone(&self.act),
        }
    }
}

/// Request/response handle bound to one actor method
pub struct CallProxy<A: Actor, T, U> {
    target: ActorRef<A>,
    act: Arc<dyn Fn(&mut A, T) -> U + Send + Sync>,
}

impl<A: Actor, T: Send + 'static, U: Send + 'static> CallProxy<A, T, U> {
    pub fn new<F>(target: ActorRef<A>, act: F) -> Self
    where
        F: Fn(&mut A, T) -> U + Send + Sync + 'static,
    {
        Self {
            target,
            act: Arc::new(act),
        }
    }

    pub fn call(&self, value: T) -> Result<ActorFuture<U>> {
        let act = Arc::clone(&self.act);
        self.target.call(move |actor| act(actor, value))
    }

    pub fn target(&self) -> &ActorRef<A> {
        &self.target
    }
}

impl<A: Actor, T, U> Clone for CallProxy<A, T, U> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            act: Arc::clone(&self.act),
        }
    }
}

/// Behaviour of a [`TypedActor`]
pub trait OnReceive<T, U>: Send + 'static {
    fn on_receive(&mut self, msg: T) -> U;
}

impl<T, U, F> OnReceive<T, U> for F
where
    F: FnMut(T) -> U + Send + 'static,
{
    fn on_receive(&mut self, msg: T) -> U {
        self(msg)
    }
}

/// Actor state behind a [`TypedActor`]
pub struct TypedState<T, U> {
    behaviour: Box<dyn OnReceive<T, U>>,
    _types: PhantomData<fn(T) -> U>,
}

impl<T: 'static, U: 'static> Actor for TypedState<T, U> {}

/// Actor with one message type and one reply type
pub struct TypedActor<T: 'static, U: 'static> {
    inner: ActorRef<TypedState<T, U>>,
}

impl<T: 'static, U: 'static> Clone for TypedActor<T, U> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, U> TypedActor<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    pub fn spawn<B>(pool: &Arc<dyn WorkerPool>, behaviour: B) -> Self
    where
        B: OnReceive<T, U>,
    {
        let state = TypedState {
            behaviour: Box::new(behaviour),
            _types: PhantomData,
        };
        Self {
            inner: ActorRef::spawn(pool, state),
        }
    }

    /// Deliver a message, discarding the reply
    pub fn send(&self, msg: T) -> Result<()> {
        self.inner.send(move |state| {
            state.behaviour.on_receive(msg);
        })
    }

    pub fn call(&self, msg: T) -> Result<ActorFuture<U>> {
        self.inner.call(move |state| state.behaviour.on_receive(msg))
    }

    pub fn actor_ref(&self) -> &ActorRef<TypedState<T, U>> {
        &self.inner
    }
}

impl<A: Actor> ActorRef<A> {
    /// Run `call` on this actor, then send its result to `caller` as a
    /// message handled by `reply`.
    ///
    /// Nobody blocks: the reply is an ordinary message in the caller's queue.
    pub fn send_reply<B, V, C, R>(&self, caller: &ActorRef<B>, call: C, reply: R) -> Result<()>
    where
        B: Actor,
        V: Send + 'static,
        C: FnOnce(&mut A) -> V + Send + 'static,
        R: FnOnce(&mut B, V) + Send + 'static,
    {
        let caller = caller.clone();
        self.send_fallible(move |actor| {
            let value = call(actor);
            caller.send(move |origin| reply(origin, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::ActorError;

    #[derive(Default)]
    struct Inventory {
        items: Vec<String>,
    }

    impl Actor for Inventory {}

    #[derive(Default)]
    struct Clerk {
        last_count: Option<usize>,
    }

    impl Actor for Clerk {}

    fn pool() -> Arc<dyn WorkerPool> {
        PoolConfig::bounded(2).build().unwrap()
    }

    #[test]
    fn test_send_and_call_proxies() {
        let inventory = ActorRef::<Inventory>::spawn_default(&pool());
        let add = SendProxy::new(inventory.clone(), |inv: &mut Inventory, item: String| {
            inv.items.push(item)
        });
        let count = CallProxy::new(inventory.clone(), |inv: &mut Inventory, prefix: &'static str| {
            inv.items.iter().filter(|i| i.starts_with(prefix)).count()
        });

        for item in ["apple", "avocado", "banana"] {
            add.clone().send(item.to_string()).unwrap();
        }
        assert_eq!(count.call("a").unwrap().get().unwrap(), 2);
        assert_eq!(add.target(), count.target());
    }

    #[test]
    fn test_typed_actor_keeps_state() {
        let mut total = 0u64;
        let accumulator: TypedActor<u64, u64> = TypedActor::spawn(&pool(), move |n: u64| {
            total += n;
            total
        });
        accumulator.send(5).unwrap();
        accumulator.send(10).unwrap();
        assert_eq!(accumulator.call(0).unwrap().get().unwrap(), 15);
        assert_eq!(accumulator.actor_ref().stats().enqueued, 3);
    }

    #[test]
    fn test_send_reply_delivers_to_caller() {
        let pool = pool();
        let inventory = ActorRef::spawn(&pool, Inventory {
            items: vec!["hammer".into(), "saw".into()],
        });
        let clerk = ActorRef::<Clerk>::spawn_default(&pool);

        inventory
            .send_reply(&clerk, |inv| inv.items.len(), |clerk, n| clerk.last_count = Some(n))
            .unwrap();
        inventory.await_messages(None).unwrap();
        clerk.await_messages(None).unwrap();
        assert_eq!(clerk.call(|c| c.last_count).unwrap().get().unwrap(), Some(2));
    }

    #[test]
    fn test_proxy_after_shutdown() {
        let pool = pool();
        let inventory = ActorRef::<Inventory>::spawn_default(&pool);
        let add = SendProxy::new(inventory, |inv: &mut Inventory, item: &'static str| {
            inv.items.push(item.into())
        });
        pool.shutdown();
        assert!(matches!(add.send("late"), Err(ActorError::PoolShutdown { .. })));
    }
}
