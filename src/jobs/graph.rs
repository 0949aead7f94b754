//! Task graphs: dependency DAGs executed on a job system.
//!
//! A graph owns its jobs and tracks the **roots** (jobs with no
//! prerequisites). `execute` submits every root and then waits on every job
//! in creation order; dependency edges take care of the rest. Handles are
//! plain indices, so no raw pointers cross the API.
//!
//! Dependency cycles are a contract violation: no job in the cycle ever
//! reaches a prerequisite count of zero, and `execute` waits forever.

use std::sync::Arc;

use tracing::debug_span;

use crate::jobs::pool::{Job, JobSystem};

/// Index-based handle to a job inside one [`TaskGraph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct JobId(usize);

/// A DAG of jobs, executed as a unit on a [`JobSystem`].
pub struct TaskGraph<'js> {
    pool: &'js JobSystem,
    jobs: Vec<Arc<Job>>,
    roots: Vec<usize>,
}

impl<'js> TaskGraph<'js> {
    /// Creates an empty graph bound to `pool`.
    pub fn new(pool: &'js JobSystem) -> Self {
        Self { pool, jobs: Vec::new(), roots: Vec::new() }
    }

    /// Appends a job. It is a root until an edge makes it depend on
    /// another job.
    pub fn add(&mut self, name: impl Into<String>, callable: impl FnOnce() + Send + 'static) -> JobId {
        let id = JobId(self.jobs.len());
        self.jobs.push(Job::new(name.into(), callable));
        self.roots.push(id.0);
        id
    }

    /// Declares that `after` may only run once `before` has completed.
    ///
    /// ## Panics
    /// Panics if the two handles name the same job.
    pub fn depends_on(&mut self, after: JobId, before: JobId) {
        assert!(after != before, "a job cannot depend on itself");
        self.jobs[after.0].bump_prerequisites();
        self.jobs[before.0].push_dependent(Arc::clone(&self.jobs[after.0]));
        self.roots.retain(|&root| root != after.0);
    }

    /// Submits every root and blocks until all jobs have completed.
    ///
    /// The calling thread helps execute jobs while waiting. Completion of a
    /// prerequisite happens-before its dependents start.
    pub fn execute(&self) {
        let _span = debug_span!("task_graph", jobs = self.jobs.len()).entered();
        for &root in &self.roots {
            self.pool.submit(&self.jobs[root]);
        }
        for job in &self.jobs {
            self.pool.wait(job);
        }
    }

    /// Drops every job and edge. Exclusive access guarantees no `execute`
    /// is in flight.
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.roots.clear();
    }

    /// Number of jobs in the graph.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// `true` if the graph holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Shared handle to a job, usable with [`JobSystem::wait`].
    pub fn job(&self, id: JobId) -> &Arc<Job> {
        &self.jobs[id.0]
    }
}
