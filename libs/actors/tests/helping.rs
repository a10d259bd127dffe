//! Helping and Deadlock Freedom
//!
//! Blocked waiters drain the producing actor themselves when the pool has no
//! spare workers. These scenarios would hang on a plain bounded pool.

mod common;

use common::{bounded_pool, init_tracing, managed_pool};
use crossbeam_channel::{bounded, Sender};
use pool_actors::{await_all, Actor, ActorRef, WorkerPool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct Player {
    partner: Option<ActorRef<Player>>,
    last: i64,
    handled: usize,
    finished: Sender<()>,
}

impl Actor for Player {}

/// Record the ball and hit it back until it reaches zero
fn volley(player: &mut Player, ball: i64) -> i64 {
    player.last = ball;
    player.handled += 1;
    if ball > 0 {
        if let Some(partner) = &player.partner {
            partner
                .call(move |p| volley(p, ball - 1))
                .expect("pool is running");
        }
    } else {
        let _ = player.finished.send(());
    }
    ball
}

#[test]
fn test_ping_pong_on_two_threads() {
    init_tracing();
    let pool = bounded_pool(2);
    let (finished_tx, finished_rx) = bounded(1);
    let new_player = || Player {
        partner: None,
        last: -1,
        handled: 0,
        finished: finished_tx.clone(),
    };
    let ping = ActorRef::spawn(&pool, new_player());
    let pong = ActorRef::spawn(&pool, new_player());
    let pong_ref = pong.clone();
    ping.send(move |p| p.partner = Some(pong_ref)).unwrap();
    let ping_ref = ping.clone();
    pong.send(move |p| p.partner = Some(ping_ref)).unwrap();

    ping.call(|p| volley(p, 11)).unwrap();
    finished_rx.recv_timeout(Duration::from_secs(10)).unwrap();

    let (ping_last, ping_handled) = ping.call(|p| (p.last, p.handled)).unwrap().get().unwrap();
    let (pong_last, pong_handled) = pong.call(|p| (p.last, p.handled)).unwrap().get().unwrap();
    assert_eq!(ping_last, 1);
    assert_eq!(pong_last, 0);
    assert_eq!(ping_handled, 6);
    assert_eq!(pong_handled, 6);
    assert_eq!(ping_handled + pong_handled, 12);

    // Break the reference cycle
    ping.send(|p| p.partner = None).unwrap();
    pong.send(|p| p.partner = None).unwrap();
}

struct Stage {
    next: Option<ActorRef<Stage>>,
    visits: usize,
}

impl Actor for Stage {}

/// Pass `depth` down the chain, blocking on each downstream result
fn descend(stage: &mut Stage, depth: u64) -> u64 {
    stage.visits += 1;
    match &stage.next {
        Some(next) => next
            .call(move |s| descend(s, depth + 1))
            .and_then(|reply| reply.get())
            .expect("downstream stage answers"),
        None => depth,
    }
}

fn build_chain(pool: &Arc<dyn WorkerPool>, len: usize) -> Vec<ActorRef<Stage>> {
    let mut stages: Vec<ActorRef<Stage>> = Vec::with_capacity(len);
    for _ in 0..len {
        let next = stages.last().cloned();
        stages.push(ActorRef::spawn(pool, Stage { next, visits: 0 }));
    }
    stages.reverse();
    stages
}

#[test]
fn test_blocking_call_chain_on_single_thread() {
    init_tracing();
    let pool = bounded_pool(1);
    let chain = build_chain(&pool, 8);

    let depth = chain[0]
        .call(|s| descend(s, 0))
        .unwrap()
        .get_timeout(Duration::from_secs(10))
        .unwrap();
    assert_eq!(depth, 7);

    for stage in &chain {
        assert_eq!(stage.call(|s| s.visits).unwrap().get().unwrap(), 1);
    }
    let helped: u64 = chain.iter().map(|s| s.stats().helped_drains).sum();
    assert!(helped >= 1, "a saturated single-thread pool needs helping");
}

#[test]
fn test_blocking_call_chain_on_managed_pool() {
    init_tracing();
    let pool = managed_pool(1);
    let chain = build_chain(&pool, 5);
    let depth = chain[0]
        .call(|s| descend(s, 0))
        .unwrap()
        .get_timeout(Duration::from_secs(10))
        .unwrap();
    assert_eq!(depth, 4);
}

struct Caller {
    callee: ActorRef<Callee>,
    started: Arc<AtomicUsize>,
}

impl Actor for Caller {}

#[derive(Default)]
struct Callee {
    served: u64,
}

impl Actor for Callee {}

#[test]
fn test_every_worker_blocked_on_another_actor() {
    init_tracing();
    const K: usize = 4;
    let pool = bounded_pool(K);
    let started = Arc::new(AtomicUsize::new(0));

    let callers: Vec<_> = (0..K)
        .map(|_| {
            let callee = ActorRef::<Callee>::spawn_default(&pool);
            ActorRef::spawn(
                &pool,
                Caller {
                    callee,
                    started: Arc::clone(&started),
                },
            )
        })
        .collect();

    let replies: Vec<_> = callers
        .iter()
        .enumerate()
        .map(|(i, caller)| {
            caller
                .call(move |c| {
                    // Hold every worker before calling out
                    c.started.fetch_add(1, Ordering::SeqCst);
                    let deadline = Instant::now() + Duration::from_secs(2);
                    while c.started.load(Ordering::SeqCst) < K && Instant::now() < deadline {
                        thread::yield_now();
                    }
                    c.callee
                        .call(move |callee| {
                            callee.served += 1;
                            i as u64 * 10 + callee.served
                        })
                        .and_then(|reply| reply.get())
                        .expect("callee answers")
                })
                .unwrap()
        })
        .collect();

    await_all(&replies).unwrap();
    let values: Vec<u64> = replies.iter().map(|r| r.get().unwrap()).collect();
    assert_eq!(values, (0..K as u64).map(|i| i * 10 + 1).collect::<Vec<_>>());
}
