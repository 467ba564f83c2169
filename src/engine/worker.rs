// src/engine/worker.rs

//! Worker execution unit: runs a single job body and reports the outcome.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, info, warn};

use crate::engine::scheduler::SchedulerCore;
use crate::job::{JobId, JobRecord, JobStatus};

/// Run one job while holding a worker slot.
///
/// - Ready -> Running by compare-and-set; a job cancelled in the meantime is
///   skipped.
/// - Re-waits on every dependency's completion signal before running. This
///   is a no-op when the dependencies are already finished, and covers a
///   promotion that raced ahead of a dependency's signal.
/// - The body runs in its own Tokio task so a panic is contained and the
///   body can be aborted at shutdown.
/// - Finally the job becomes Completed or Failed, its signal fires, and the
///   readiness propagator runs for its dependents.
pub(crate) async fn run_job(core: Arc<SchedulerCore>, id: JobId, _permit: OwnedSemaphorePermit) {
    let Some(job) = core.registry.get(&id) else {
        error!(job = %id, "dispatched job missing from registry");
        return;
    };

    if !job.transition(JobStatus::Ready, JobStatus::Running) {
        debug!(job = %id, status = %job.status(), "job no longer Ready; skipping");
        return;
    }

    for dep_id in job.dependencies() {
        if let Some(dep) = core.registry.get(dep_id) {
            dep.signal().wait().await;
        }
    }

    let Some(body) = job.take_body() else {
        finish(&core, &job, JobStatus::Failed, Some("job body already taken".to_string()));
        return;
    };

    info!(job = %id, priority = job.priority(), "starting job");

    let handle = tokio::spawn(body());
    job.set_abort_handle(handle.abort_handle());
    if job.status() != JobStatus::Running {
        // Forced to a terminal state while the body was being spawned.
        handle.abort();
    }

    let result = handle.await;
    job.clear_abort_handle();

    let (status, reason) = match result {
        Ok(Ok(())) => (JobStatus::Completed, None),
        Ok(Err(err)) => (JobStatus::Failed, Some(format!("{err:#}"))),
        Err(join_err) if join_err.is_panic() => (
            JobStatus::Failed,
            Some(format!("job panicked: {}", panic_message(join_err.into_panic()))),
        ),
        Err(_cancelled) => (JobStatus::Failed, Some("job aborted".to_string())),
    };

    finish(&core, &job, status, reason);
}

/// Record the terminal state, fire the signal, then propagate.
fn finish(core: &SchedulerCore, job: &JobRecord, status: JobStatus, reason: Option<String>) {
    let won = job
        .transition_if(|s| s == JobStatus::Running, status, reason.clone())
        .is_some();

    if !won {
        // Shutdown already forced this job to a terminal state.
        debug!(job = %job.id(), status = %job.status(), "job already finalized");
        return;
    }

    match status {
        JobStatus::Completed => info!(job = %job.id(), "job completed"),
        _ => warn!(
            job = %job.id(),
            error = reason.as_deref().unwrap_or("unknown error"),
            "job failed"
        ),
    }

    job.signal().fire();
    core.propagator().on_job_finished(job.id());
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
