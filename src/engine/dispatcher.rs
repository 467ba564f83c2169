// src/engine/dispatcher.rs

//! Dispatcher loop: moves ready jobs into the bounded worker pool.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::engine::scheduler::SchedulerCore;
use crate::engine::worker::run_job;
use crate::job::JobStatus;

/// Main dispatcher loop.
///
/// Each iteration first acquires a worker slot and only then pops the ready
/// queue, so the highest-priority job stays queued until a worker can take
/// it. The pop waits at most `poll_interval`, which bounds how long a
/// shutdown goes unnoticed.
///
/// The loop exits once the scheduler is no longer running, the queue is
/// empty and no worker is in flight. Dropping the loop (on a forced
/// shutdown) drops `in_flight`, which aborts the workers.
pub(crate) async fn run_dispatcher(core: Arc<SchedulerCore>) {
    info!(workers = core.config.workers, "dispatcher started");

    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        while let Some(res) = in_flight.try_join_next() {
            log_worker_exit(res);
        }

        if !core.is_running() && core.queue.is_empty() && in_flight.is_empty() {
            break;
        }

        let permit = tokio::select! {
            permit = Arc::clone(&core.workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_closed) => {
                    error!("worker pool semaphore closed; stopping dispatcher");
                    break;
                }
            },
            Some(res) = in_flight.join_next() => {
                log_worker_exit(res);
                continue;
            }
        };

        let Some(id) = core.queue.pop_timeout(core.config.poll_interval).await else {
            continue;
        };

        match core.registry.get(&id).map(|job| job.status()) {
            Some(JobStatus::Ready) => {}
            Some(status) => {
                debug!(job = %id, %status, "dropping queue entry for job no longer Ready");
                continue;
            }
            None => {
                error!(job = %id, "queued job missing from registry");
                continue;
            }
        }

        debug!(job = %id, "dispatching job to worker pool");
        in_flight.spawn(run_job(Arc::clone(&core), id, permit));
    }

    info!("dispatcher stopped");
}

fn log_worker_exit(res: Result<(), JoinError>) {
    if let Err(err) = res {
        if err.is_panic() {
            error!(error = %err, "worker task panicked");
        } else {
            debug!(error = %err, "worker task cancelled");
        }
    }
}
