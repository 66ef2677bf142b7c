//! Bounded dispatch pool: fixed workers over a bounded work queue.
//!
//! Every event-handling task the host runs — client accept/remove, attachment
//! changes, active-client propagation, and input fan-out rounds — is submitted
//! here.  The producer (the capture layer or the network server's notification
//! thread) never blocks on extension work; it hands the job off and returns.
//!
//! Unbounded task-per-event spawning is deliberately avoided.  The queue has a
//! fixed capacity and an explicit [`OverflowPolicy`]:
//!
//! - [`DropOldest`](OverflowPolicy::DropOldest) (default): the oldest queued
//!   job is discarded and counted.  Input events are perishable — delivering a
//!   stale keypress late is worse than not delivering it.
//! - [`Block`](OverflowPolicy::Block): the producer waits for space.  Useful
//!   when every notification must be processed (e.g. test harnesses).
//!
//! A job that panics is caught and logged by the worker; it never kills the
//! worker thread.  There is no per-job timeout — a hung extension can stall a
//! worker, and under enough hung extensions the pool starves.  The dropped-job
//! counter makes that state observable.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// A unit of dispatch work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What to do when a job is submitted to a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued job to make room (and count it).
    DropOldest,
    /// Block the producer until a worker frees a slot.
    Block,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self::DropOldest
    }
}

/// Pool sizing and overflow behavior.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 512,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

struct PoolState {
    queue: VecDeque<Job>,
    /// Jobs currently executing on workers.
    active: usize,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    /// Workers wait here for jobs.
    work_ready: Condvar,
    /// Blocked producers wait here for queue space.
    space_ready: Condvar,
    /// `wait_idle` callers wait here.
    idle: Condvar,
    capacity: usize,
    overflow: OverflowPolicy,
    dropped: AtomicU64,
}

/// The shared dispatch pool.
pub struct DispatchPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchPool {
    /// Starts the worker threads.
    pub fn new(config: PoolConfig) -> Self {
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            space_ready: Condvar::new(),
            idle: Condvar::new(),
            capacity: config.queue_capacity.max(1),
            overflow: config.overflow,
            dropped: AtomicU64::new(0),
        });

        let workers = (0..config.workers.max(1))
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("dispatch-{i}"))
                    .spawn(move || worker_loop(shared))
                    .expect("failed to spawn dispatch worker")
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Submits a job.  Never blocks under `DropOldest`; may wait for queue
    /// space under `Block`.  Jobs submitted after shutdown are discarded.
    pub fn submit(&self, job: Job) {
        let mut state = self.shared.state.lock().expect("pool state poisoned");
        if state.shutdown {
            debug!("job submitted after shutdown; discarded");
            return;
        }
        while state.queue.len() >= self.shared.capacity {
            match self.shared.overflow {
                OverflowPolicy::DropOldest => {
                    state.queue.pop_front();
                    let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped, "dispatch queue full; dropped oldest job");
                }
                OverflowPolicy::Block => {
                    state = self
                        .shared
                        .space_ready
                        .wait(state)
                        .expect("pool state poisoned");
                    if state.shutdown {
                        return;
                    }
                }
            }
        }
        state.queue.push_back(job);
        drop(state);
        self.shared.work_ready.notify_one();
    }

    /// Total jobs discarded under `DropOldest`.
    pub fn dropped_jobs(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Blocks until the queue is empty and no job is executing, or the
    /// timeout elapses.  Returns whether the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock().expect("pool state poisoned");
        while !state.queue.is_empty() || state.active > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, result) = self
                .shared
                .idle
                .wait_timeout(state, deadline - now)
                .expect("pool state poisoned");
            state = next;
            if result.timed_out() && (!state.queue.is_empty() || state.active > 0) {
                return false;
            }
        }
        true
    }

    /// Stops accepting work, drains nothing further, and joins the workers.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().expect("pool state poisoned");
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        self.shared.space_ready.notify_all();
        let workers = std::mem::take(&mut *self.workers.lock().expect("workers poisoned"));
        for handle in workers {
            let _ = handle.join();
        }
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let job = {
            let mut state = shared.state.lock().expect("pool state poisoned");
            loop {
                if let Some(job) = state.queue.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.shutdown {
                    return;
                }
                state = shared.work_ready.wait(state).expect("pool state poisoned");
            }
        };
        shared.space_ready.notify_one();

        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("dispatch job panicked; worker continues");
        }

        let mut state = shared.state.lock().expect("pool state poisoned");
        state.active -= 1;
        if state.queue.is_empty() && state.active == 0 {
            shared.idle.notify_all();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
