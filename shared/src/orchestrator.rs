//! Generation lifecycle: start one worker per core for a problem, watch the
//! result slot, and tear the generation down when it wins or is superseded.

use std::{
    sync::{atomic::Ordering, Arc},
    time::Instant,
};

use tracing::*;

use crate::{
    cancel::CancelToken,
    pool::{JobHandle, PoolConfig, WorkerPool},
    problem::Problem,
    slot::ResultSlot,
    solver::{self, SearchContext, SearchOutcome, SearchReport},
    types::{Nonce, Solution},
};

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Workers per generation; `None` uses every available core.
    pub workers: Option<usize>,
    pub pin_cores: bool,
}

impl OrchestratorConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Workers, token and counters that belong to one problem.
struct Generation {
    problem: Arc<Problem>,
    context: SearchContext,
    handles: Vec<JobHandle<SearchReport>>,
    started: Instant,
}

impl Generation {
    /// Cancel every worker and wait until all of them have returned.
    fn drain(self) -> Vec<SearchReport> {
        self.context.token.cancel();

        let mut reports = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.wait() {
                Ok(report) => reports.push(report),
                Err(err) => error!("worker failed: {err}"),
            }
        }

        let iterations = self.context.iterations.load(Ordering::SeqCst);
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            info!(
                "{} stopped after {iterations} iterations, search power: {:.2} it/s",
                self.problem.kind.name(),
                iterations as f64 / elapsed
            );
        }
        reports
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    pool: WorkerPool,
    slot: Arc<ResultSlot<Nonce>>,
    generation: Option<Generation>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let pool = WorkerPool::new(PoolConfig { name: Some("miner".into()), pin_cores: config.pin_cores });
        Self { config, pool, slot: Arc::new(ResultSlot::new()), generation: None }
    }

    pub fn is_running(&self) -> bool {
        self.generation.is_some()
    }

    /// Problem of the active generation.
    pub fn problem(&self) -> Option<&Problem> {
        self.generation.as_ref().map(|generation| generation.problem.as_ref())
    }

    /// Replace whatever is running with a generation for `problem`.
    ///
    /// Returns the number of workers started.
    pub fn start(&mut self, problem: Problem) -> usize {
        self.stop();

        // no stale worker is left, so nobody can publish into the emptied slot
        if let Some(stale) = self.slot.acquire().take() {
            debug!("drop nonce {stale} of a superseded problem");
        }

        let problem = Arc::new(problem);
        let context = SearchContext::new(CancelToken::new(), self.slot.clone());
        let workers = self.config.worker_count();

        info!("start mining {problem} with {workers} workers");

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let initial_nonce: Nonce = rand::random();
            let problem = problem.clone();
            let context = context.clone();
            match self.pool.submit(move || solver::run(worker, &problem, initial_nonce, &context)) {
                Ok(handle) => handles.push(handle),
                Err(err) => error!("fail to start worker {worker}: {err}"),
            }
        }

        let started = handles.len();
        debug!("{started} workers running on a pool of {} threads", self.pool.threads());
        self.generation = Some(Generation { problem, context, handles, started: Instant::now() });
        started
    }

    /// Take a published nonce, if any, and end the generation that found it.
    pub fn poll(&mut self) -> Option<Solution> {
        let nonce = {
            let guard = self.slot.acquire();
            if !guard.has_value() {
                return None;
            }
            let nonce = *guard.peek();
            guard.release();
            nonce
        };

        let Some(generation) = self.generation.take() else {
            self.slot.acquire().clear();
            return None;
        };
        let problem = generation.problem.clone();
        let reports = generation.drain();
        // clear only once every worker has returned, a worker still looping
        // could otherwise publish a second nonce into the emptied slot
        self.slot.acquire().clear();
        let finder = reports.iter().find(|r| r.outcome == SearchOutcome::Published(nonce));

        info!(
            "nonce {nonce} found for {} by worker {:?}",
            problem.kind.name(),
            finder.map(|r| r.worker)
        );

        Some(Solution {
            challenge_id: problem.challenge_id,
            nonce,
            last_solution_hash: problem.last_solution_hash.clone(),
        })
    }

    /// Cancel and drain the active generation, if any.
    pub fn stop(&mut self) -> Vec<SearchReport> {
        match self.generation.take() {
            Some(generation) => {
                debug!("stopping existing jobs");
                generation.drain()
            }
            None => vec![],
        }
    }

    pub fn shutdown(mut self) {
        self.stop();
        // `Drop` of the pool joins its threads
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // workers must be out of their loops before the pool joins them
        self.stop();
    }
}
