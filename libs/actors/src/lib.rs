//! Pool-Scheduled Actors
//!
//! Lightweight actor runtime on top of a shared worker pool. An actor is a
//! mailbox plus a value that only ever runs on one thread at a time; many
//! actors share a small number of pool threads, each actor being scheduled
//! as a single task whenever its mailbox becomes non-empty.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  send/call   ┌─────────────────────────────┐
//! │  ActorRef<A> │─────────────▶│ ActorCore                   │
//! └──────────────┘              │  mailbox ─▶ drain ─▶ actor  │
//!        │                      │  scheduled / running flags  │
//!        │ ActorFuture<V>       └──────────────┬──────────────┘
//!        ▼                                     │ one episode at a time
//! ┌──────────────┐  saturated pool?            ▼
//! │ waiter       │── drain on own ──▶ ┌─────────────────────┐
//! │ (get/wait)   │   thread           │ WorkerPool          │
//! └──────────────┘                    │ bounded │ managed │ │
//!                                     │ inline              │
//!                                     └─────────────────────┘
//! ```
//!
//! Guarantees per actor:
//! - messages are processed in send order, each exactly once
//! - at most one thread runs the actor at any instant
//! - at most one scheduling episode is pending in the pool
//! - a failing message never affects the ones after it
//!
//! A thread blocked on an [`ActorFuture`] while the pool has no spare
//! workers drains the producing actor itself, so bounded pools do not
//! deadlock on call chains between their own actors.
//!
//! # Example
//!
//! ```rust
//! use pool_actors::{Actor, ActorRef, PoolConfig};
//!
//! struct Greeter {
//!     greeted: Vec<String>,
//! }
//!
//! impl Actor for Greeter {}
//!
//! let pool = PoolConfig::bounded(2).build().unwrap();
//! let greeter = ActorRef::spawn(&pool, Greeter { greeted: Vec::new() });
//!
//! greeter.send(|g| g.greeted.push("alice".into())).unwrap();
//! let reply = greeter
//!     .call(|g| format!("hello {}", g.greeted.join(", ")))
//!     .unwrap();
//! assert_eq!(reply.get().unwrap(), "hello alice");
//! ```

pub mod actor;
pub mod config;
pub mod core;
pub mod error;
pub mod future;
pub mod pool;
pub mod proxy;
pub mod ring;

pub use actor::{Actor, ActorRef, WeakActorRef};
pub use config::{PoolConfig, PoolStrategy, RuntimeConfig};
pub use self::core::{ActorCore, ActorId, CoreListener, CoreMetrics, CoreStats, Drainable, Receive};
pub use error::{ActorError, Result};
pub use future::{await_all, await_any, spawn_stateless, ActorFuture, Promise};
pub use pool::{BoundedPool, InlinePool, ManagedPool, PoolStats, Task, WorkerPool};
pub use proxy::{CallProxy, OnReceive, SendProxy, TypedActor, TypedState};
pub use ring::RingBuffer;
