//! Growable pool of reusable worker threads.
//!
//! Threads pull jobs from one shared channel. A submission either claims an
//! idle thread or spawns a new one, so a job never queues behind another
//! job. Each submission returns a [`JobHandle`] to wait on.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use core_affinity::CoreId;
use tracing::*;

use crate::errors::PoolError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Name prefix for spawned threads.
    pub name: Option<String>,
    /// Bind the n-th spawned thread to CPU core `n % cores`.
    pub pin_cores: bool,
}

#[derive(Default)]
struct PoolState {
    idle: usize,
    threads: Vec<JoinHandle<()>>,
}

pub struct WorkerPool {
    config: PoolConfig,
    sender: Option<mpsc::Sender<Job>>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    state: Arc<Mutex<PoolState>>,
    core_ids: Vec<CoreId>,
}

/// Waits for one submitted job.
#[must_use = "a job handle should be waited on"]
pub struct JobHandle<T> {
    receiver: mpsc::Receiver<thread::Result<T>>,
}

impl<T> JobHandle<T> {
    /// Block until the job returns.
    pub fn wait(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(PoolError::JobPanicked(panic_message(payload.as_ref()))),
            Err(_) => Err(PoolError::Disconnected),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let core_ids = if config.pin_cores {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            vec![]
        };

        Self {
            config,
            sender: Some(sender),
            receiver: Arc::new(Mutex::new(receiver)),
            state: Arc::new(Mutex::new(PoolState::default())),
            core_ids,
        }
    }

    /// Number of threads spawned so far.
    pub fn threads(&self) -> usize {
        self.lock_state().threads.len()
    }

    /// Run `job` on a pool thread, spawning one if none is idle.
    pub fn submit<F, T>(&self, job: F) -> Result<JobHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static, {
        let Some(sender) = &self.sender else {
            return Err(PoolError::Closed);
        };

        let (result_tx, result_rx) = mpsc::sync_channel(1);
        let state = self.state.clone();
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            // mark idle before reporting so a waiter that resubmits reuses this thread
            state.lock().unwrap_or_else(PoisonError::into_inner).idle += 1;
            // the handle may already be gone
            result_tx.send(result).ok();
        });

        {
            let mut state = self.lock_state();
            if state.idle > 0 {
                state.idle -= 1;
            } else {
                let index = state.threads.len();
                let handle = self.spawn_thread(index)?;
                state.threads.push(handle);
            }
        }

        // at least one thread is reserved for this job, so it never waits
        // behind another one
        sender.send(job).map_err(|_| PoolError::Closed)?;

        Ok(JobHandle { receiver: result_rx })
    }

    fn spawn_thread(&self, index: usize) -> Result<JoinHandle<()>, PoolError> {
        let receiver = self.receiver.clone();
        let core = if self.core_ids.is_empty() {
            None
        } else {
            Some(self.core_ids[index % self.core_ids.len()])
        };
        let name = format!("{}-{index}", self.config.name.as_deref().unwrap_or("worker"));

        let handle = thread::Builder::new().name(name).spawn(move || {
            if let Some(core) = core {
                // bound thread to core
                if !core_affinity::set_for_current(core) {
                    warn!("fail to pin worker {index} to core {}", core.id);
                }
            }
            debug!("worker thread {index} started");

            loop {
                // receive job from channel
                let job = {
                    let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                    guard.recv()
                };

                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            }
            debug!("worker thread {index} stopped");
        })?;

        Ok(handle)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the job channel and join every thread.
    ///
    /// Callers must make sure running jobs are on their way out (e.g. by
    /// cancelling them) before calling this, otherwise it blocks until they
    /// return on their own.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // dropping the sender ends every `recv` once the queue is empty
        self.sender.take();
        let threads = std::mem::take(&mut self.lock_state().threads);
        for handle in threads {
            if let Err(err) = handle.join() {
                error!("worker thread panicked: {err:?}");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Barrier,
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn submissions_run_concurrently() {
        let pool = WorkerPool::new(PoolConfig::default());
        let jobs = 8;
        // every job blocks until all of them are running at once
        let barrier = Arc::new(Barrier::new(jobs));

        let handles: Vec<_> = (0..jobs)
            .map(|i| {
                let barrier = barrier.clone();
                pool.submit(move || {
                    barrier.wait();
                    i * 2
                })
                .unwrap()
            })
            .collect();

        let mut results: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        results.sort();
        assert_eq!(results, (0..jobs).map(|i| i * 2).collect::<Vec<_>>());
        assert_eq!(pool.threads(), jobs);
    }

    #[test]
    fn finished_threads_are_reused() {
        let pool = WorkerPool::new(PoolConfig::default());
        for i in 0..5u64 {
            assert_eq!(pool.submit(move || i + 1).unwrap().wait().unwrap(), i + 1);
        }
        assert_eq!(pool.threads(), 1);
    }

    #[test]
    fn wait_blocks_until_job_returns() {
        let pool = WorkerPool::new(PoolConfig::default());
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let handle = pool
            .submit(move || {
                thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        handle.wait().unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn panicking_job_is_reported_and_thread_survives() {
        let pool = WorkerPool::new(PoolConfig { name: Some("test".into()), pin_cores: false });
        let err = pool.submit(|| -> u32 { panic!("boom") }).unwrap().wait().unwrap_err();
        assert!(matches!(err, PoolError::JobPanicked(ref msg) if msg == "boom"), "{err}");

        assert_eq!(pool.submit(|| 3).unwrap().wait().unwrap(), 3);
        assert_eq!(pool.threads(), 1);
    }

    #[test]
    fn shutdown_joins_idle_threads() {
        let pool = WorkerPool::new(PoolConfig::default());
        let handles: Vec<_> = (0..4).map(|i| pool.submit(move || i).unwrap()).collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        pool.shutdown();
    }
}
