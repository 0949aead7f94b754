//! Jobs and the work-stealing worker pool.
//!
//! ## Purpose
//!
//! A [`Job`] is one unit of work: a callable, a count of unfinished
//! prerequisites, the jobs that depend on it, and a completion flag. The
//! [`JobSystem`] executes jobs on a fixed pool of worker threads, each with
//! its own deque; idle workers steal from any deque, and threads blocked in
//! [`wait`](JobSystem::wait) help by stealing instead of spinning.
//!
//! ## Scheduling
//!
//! - `submit` enqueues only jobs whose prerequisite count is zero, onto a
//!   deque chosen round-robin, and wakes one worker.
//! - Completing a job decrements each dependent's prerequisite count; the
//!   dependent that reaches zero is enqueued automatically by whichever
//!   thread performed the final decrement.
//! - Workers drain their own deque from the front, then steal; when both
//!   fail they sleep on the pool's condition variable with a short timeout.
//!
//! ## Memory ordering
//!
//! Completion is published with a release store *after* the callable
//! returns, and the dependent decrement path is acquire-release, so a
//! dependent's callable always observes everything its prerequisites wrote.
//! A job's callable runs exactly once: it is taken out of a mutex-protected
//! option, so even a double-submitted job executes a single time.
//!
//! ## Shutdown
//!
//! Dropping the pool sets the shutdown flag, wakes every worker, and joins
//! them. Workers finish the job in hand and exit; queued work is discarded.
//! There is no per-job cancellation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace_span};

/// How long an idle worker sleeps before rechecking the queues.
const IDLE_WAIT: Duration = Duration::from_millis(1);

type JobFn = Box<dyn FnOnce() + Send>;

/// A unit of work with prerequisites and dependents.
///
/// Jobs are created by a [`TaskGraph`](crate::jobs::graph::TaskGraph) and
/// shared with the pool through `Arc`; the graph keeps them alive for the
/// whole of `execute`.
pub struct Job {
    name: String,
    callable: Mutex<Option<JobFn>>,
    unfinished_deps: AtomicI32,
    dependents: Mutex<Vec<Arc<Job>>>,
    completed: AtomicBool,
}

impl Job {
    pub(crate) fn new(name: String, callable: impl FnOnce() + Send + 'static) -> Arc<Job> {
        Arc::new(Job {
            name,
            callable: Mutex::new(Some(Box::new(callable))),
            unfinished_deps: AtomicI32::new(0),
            dependents: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
        })
    }

    /// Diagnostic name given at graph construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once the callable has returned. Acquire load: pairs with the
    /// release store made after execution.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) fn bump_prerequisites(&self) {
        self.unfinished_deps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn push_dependent(&self, dependent: Arc<Job>) {
        self.dependents.lock().push(dependent);
    }
}

struct Shared {
    /// One deque per worker. A single lock serializes all queue access,
    /// including stealing; see DESIGN.md for the lock-free alternative.
    queues: Mutex<Vec<VecDeque<Arc<Job>>>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    next_queue: AtomicU32,
}

/// Fixed pool of worker threads executing [`Job`]s with work stealing.
///
/// One instance per application; create it at startup and drop it at
/// shutdown. The creating thread participates through
/// [`wait`](Self::wait)/[`wait_all`](Self::wait_all), which help-steal
/// rather than block.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Default for JobSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSystem {
    /// Creates a pool with `max(1, hardware_threads - 1)` workers.
    pub fn new() -> Self {
        let hardware = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_workers(hardware.saturating_sub(1).max(1))
    }

    /// Creates a pool with an explicit worker count (clamped to at least 1).
    pub fn with_workers(count: usize) -> Self {
        let count = count.max(1);
        let shared = Arc::new(Shared {
            queues: Mutex::new(vec![VecDeque::new(); count]),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_queue: AtomicU32::new(0),
        });
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("engine-worker-{id}"))
                .spawn(move || worker_loop(shared, id))
                .expect("failed to spawn job system worker");
            workers.push(handle);
        }
        info!(workers = count, "job system started");
        Self { shared, workers }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues `job` if its prerequisite count is zero and wakes a worker.
    ///
    /// Jobs with outstanding prerequisites are left alone; the thread that
    /// completes the final prerequisite enqueues them.
    pub fn submit(&self, job: &Arc<Job>) {
        submit_ready(&self.shared, job);
    }

    /// Blocks until `job` completes, executing other jobs meanwhile.
    ///
    /// Never spins pure-CPU: when no work is stealable the thread yields.
    pub fn wait(&self, job: &Arc<Job>) {
        while !job.is_completed() {
            match steal(&self.shared) {
                Some(stolen) => run_job(&self.shared, stolen),
                None => thread::yield_now(),
            }
        }
    }

    /// Helps execute jobs until a single locked snapshot observes every
    /// deque empty.
    pub fn wait_all(&self) {
        loop {
            let all_empty = self.shared.queues.lock().iter().all(VecDeque::is_empty);
            if all_empty {
                break;
            }
            match steal(&self.shared) {
                Some(stolen) => run_job(&self.shared, stolen),
                None => thread::yield_now(),
            }
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("job system stopped");
    }
}

fn submit_ready(shared: &Shared, job: &Arc<Job>) {
    if job.unfinished_deps.load(Ordering::Acquire) > 0 {
        return;
    }
    {
        let mut queues = shared.queues.lock();
        let index = shared.next_queue.fetch_add(1, Ordering::Relaxed) as usize % queues.len();
        queues[index].push_back(Arc::clone(job));
    }
    shared.work_ready.notify_one();
}

/// Pops the first job found across all deques, front first.
fn steal(shared: &Shared) -> Option<Arc<Job>> {
    let mut queues = shared.queues.lock();
    for queue in queues.iter_mut() {
        if let Some(job) = queue.pop_front() {
            return Some(job);
        }
    }
    None
}

/// Executes a job and dispatches dependents that become ready.
fn run_job(shared: &Shared, job: Arc<Job>) {
    let callable = job.callable.lock().take();
    // A second pop of the same job (double submit) finds the callable gone
    // and must not re-publish completion or re-notify dependents.
    let Some(callable) = callable else {
        return;
    };
    {
        let _span = trace_span!("job", name = %job.name).entered();
        callable();
    }
    job.completed.store(true, Ordering::Release);

    let dependents = job.dependents.lock().clone();
    for dependent in dependents {
        let previous = dependent.unfinished_deps.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "job dependency count underflow");
        if previous == 1 {
            submit_ready(shared, &dependent);
        }
    }
}

fn worker_loop(shared: Arc<Shared>, id: usize) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        let job = {
            let mut queues = shared.queues.lock();
            queues[id].pop_front()
        };
        let job = job.or_else(|| steal(&shared));
        match job {
            Some(job) => run_job(&shared, job),
            None => {
                let mut queues = shared.queues.lock();
                if shared.shutdown.load(Ordering::Acquire) {
                    break;
                }
                if queues.iter().all(VecDeque::is_empty) {
                    let _ = shared.work_ready.wait_for(&mut queues, IDLE_WAIT);
                }
            }
        }
    }
}
