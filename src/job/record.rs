// src/job/record.rs

//! Registry entry for a single job.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

use tokio::task::AbortHandle;
use tracing::debug;

use crate::job::{lock, CompletionSignal, JobBody, JobId, JobStatus};

/// Mutable part of a job, guarded by a single mutex so that status, error
/// and timestamps always change together.
#[derive(Debug)]
struct JobState {
    status: JobStatus,
    error: Option<String>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// A job as stored in the registry.
///
/// Identity, priority and dependencies are fixed at submission. Status only
/// moves along [`JobStatus::can_transition_to`] edges, and only through
/// compare-and-set style methods, so two components racing on the same job
/// cannot both win a transition.
pub struct JobRecord {
    id: JobId,
    priority: i64,
    /// Submission order; breaks priority ties in the ready queue.
    seq: u64,
    dependencies: Vec<JobId>,
    state: Mutex<JobState>,
    body: Mutex<Option<JobBody>>,
    /// Handle to the spawned body while it runs, for forced shutdown.
    abort: Mutex<Option<AbortHandle>>,
    signal: CompletionSignal,
}

impl JobRecord {
    pub fn new(id: JobId, priority: i64, seq: u64, dependencies: Vec<JobId>, body: JobBody) -> Self {
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();

        Self {
            id,
            priority,
            seq,
            dependencies,
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                error: None,
                started_at: None,
                finished_at: None,
            }),
            body: Mutex::new(Some(body)),
            abort: Mutex::new(None),
            signal: CompletionSignal::new(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn dependencies(&self) -> &[JobId] {
        &self.dependencies
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.state).status
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// Compare-and-set: move `from -> to` if the job is currently in `from`.
    pub fn transition(&self, from: JobStatus, to: JobStatus) -> bool {
        self.transition_if(|current| current == from, to, None).is_some()
    }

    /// Move to `to` if the current status passes `accept` and the edge is
    /// legal. Returns the previous status on success.
    ///
    /// `error` is recorded alongside a transition into `Failed`.
    pub fn transition_if(
        &self,
        accept: impl Fn(JobStatus) -> bool,
        to: JobStatus,
        error: Option<String>,
    ) -> Option<JobStatus> {
        let mut state = lock(&self.state);
        let from = state.status;

        if !accept(from) || !from.can_transition_to(to) {
            return None;
        }

        state.status = to;
        let now = Instant::now();
        if to == JobStatus::Running {
            state.started_at = Some(now);
        }
        if to.is_terminal() {
            state.finished_at = Some(now);
            if to == JobStatus::Failed {
                state.error = error;
            }
        }
        drop(state);

        debug!(job = %self.id, %from, %to, "job status transition");
        Some(from)
    }

    /// Take the body out of the record. Only the first caller gets it.
    pub fn take_body(&self) -> Option<JobBody> {
        lock(&self.body).take()
    }

    pub fn set_abort_handle(&self, handle: AbortHandle) {
        *lock(&self.abort) = Some(handle);
    }

    pub fn clear_abort_handle(&self) {
        lock(&self.abort).take();
    }

    /// Abort the running body, if any. Returns whether a handle was present.
    pub fn abort(&self) -> bool {
        match lock(&self.abort).take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = lock(&self.state);
        JobSnapshot {
            id: self.id.clone(),
            priority: self.priority,
            dependencies: self.dependencies.clone(),
            status: state.status,
            error: state.error.clone(),
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("dependencies", &self.dependencies)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Point-in-time, read-only copy of a job's public state.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: JobId,
    pub priority: i64,
    pub dependencies: Vec<JobId>,
    pub status: JobStatus,
    /// Failure reason, set when `status == Failed`.
    pub error: Option<String>,
    /// When the job entered `Running`.
    pub started_at: Option<Instant>,
    /// When the job reached a terminal state.
    pub finished_at: Option<Instant>,
}
