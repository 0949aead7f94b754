//! Work-stealing job execution.
//!
//! [`pool::JobSystem`] owns a fixed set of worker threads with one deque
//! each; [`graph::TaskGraph`] is the DAG front-end that builds dependency
//! graphs of jobs and executes them on a pool. One `JobSystem` per
//! application; there is no process-global instance.

pub mod graph;
pub mod pool;
