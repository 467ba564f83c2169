// src/engine/mod.rs

//! Execution engine for jobdag.
//!
//! This module ties together:
//! - the ready queue (priority-ordered job IDs)
//! - the dispatcher loop that drains the queue into a bounded worker pool
//! - the worker execution unit that runs job bodies and reports completion
//! - the public [`Scheduler`] handle: submit, query, wait, cancel, shutdown

use std::time::Duration;

use crate::types::FailurePolicy;

pub mod dispatcher;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use queue::ReadyQueue;
pub use scheduler::Scheduler;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Default bounded wait of a dispatcher pop, between shutdown checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runtime options for a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Size of the worker pool. Clamped to at least 1.
    pub workers: usize,
    /// How long the dispatcher waits on an empty queue before re-checking
    /// whether the scheduler is shutting down.
    pub poll_interval: Duration,
    /// What happens to dependents of a job that failed or was cancelled.
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}
