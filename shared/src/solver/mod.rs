//! Search state machines and the cancellable loop that drives them.
//!
//! A solver only knows how to run one attempt: build a candidate from the
//! current seed, hash it, and compare. The driver owns the loop, checks the
//! cancel token once per attempt and publishes a win into the result slot.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::*;

use crate::{
    cancel::CancelToken,
    problem::{ChallengeKind, Problem},
    slot::ResultSlot,
    types::Nonce,
};

pub mod shortest_path;
pub mod sorted_list;

pub use shortest_path::ShortestPathSearch;
pub use sorted_list::SortedListSearch;

/// Result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The candidate matched; carries the nonce behind the active seed.
    Found(Nonce),
    /// No match; the solver has already moved to the next seed.
    Miss,
    /// The instance can never produce a candidate.
    Unsolvable,
}

pub trait Search {
    fn attempt(&mut self) -> Attempt;
}

/// Everything a worker shares with the rest of its generation.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub token: CancelToken,
    pub slot: Arc<ResultSlot<Nonce>>,
    /// Attempts made by all workers of the generation, updated in batches
    /// of [`FLUSH_EVERY`] and exact once every worker has returned.
    pub iterations: Arc<AtomicU64>,
}

impl SearchContext {
    pub fn new(token: CancelToken, slot: Arc<ResultSlot<Nonce>>) -> Self {
        Self { token, slot, iterations: Arc::new(AtomicU64::new(0)) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// This worker found a nonce and stored it in the slot.
    Published(Nonce),
    /// This worker found a nonce but another one got there first.
    Lost(Nonce),
    Cancelled,
    Unsolvable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    pub worker: usize,
    pub iterations: u64,
    pub outcome: SearchOutcome,
}

/// Attempts a worker counts locally before adding them to the shared counter.
pub const FLUSH_EVERY: u64 = 64;

/// Loop `search` until it finds a nonce, gives up, or the token is cancelled.
pub fn drive<S: Search>(worker: usize, search: &mut S, ctx: &SearchContext) -> SearchReport {
    let mut iterations = 0;
    let outcome = loop {
        if ctx.token.is_cancelled() {
            break SearchOutcome::Cancelled;
        }

        let attempt = search.attempt();
        iterations += 1;
        if iterations % FLUSH_EVERY == 0 {
            ctx.iterations.fetch_add(FLUSH_EVERY, Ordering::Relaxed);
        }

        match attempt {
            Attempt::Miss => continue,
            Attempt::Unsolvable => break SearchOutcome::Unsolvable,
            Attempt::Found(nonce) => {
                // presence check and publish under one acquisition
                let mut guard = ctx.slot.acquire();
                break if guard.publish_if_empty(nonce) {
                    SearchOutcome::Published(nonce)
                } else {
                    SearchOutcome::Lost(nonce)
                };
            }
        }
    };

    ctx.iterations.fetch_add(iterations % FLUSH_EVERY, Ordering::Relaxed);

    debug!("worker {worker}: {outcome:?} after {iterations} iterations");
    SearchReport { worker, iterations, outcome }
}

/// Build the solver `problem` calls for and run it to completion.
pub fn run(worker: usize, problem: &Problem, initial_nonce: Nonce, ctx: &SearchContext) -> SearchReport {
    debug!("worker {worker}: mining {} from nonce {initial_nonce}", problem.kind.name());

    let reference = problem.last_solution_hash.as_bytes();
    match problem.kind {
        ChallengeKind::SortedList { nb_elements, order } => {
            let mut search = SortedListSearch::new(
                reference,
                problem.fingerprint.clone(),
                nb_elements,
                order,
                initial_nonce,
            );
            drive(worker, &mut search, ctx)
        }
        ChallengeKind::ShortestPath { grid_size, nb_blockers } => {
            let mut search = ShortestPathSearch::new(
                reference,
                problem.fingerprint.clone(),
                grid_size,
                nb_blockers,
                initial_nonce,
            );
            drive(worker, &mut search, ctx)
        }
    }
}
