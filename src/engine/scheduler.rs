// src/engine/scheduler.rs

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::{JobRegistry, ReadinessPropagator};
use crate::engine::{dispatcher, ReadyQueue, SchedulerConfig};
use crate::errors::{JobdagError, Result};
use crate::job::{lock, JobId, JobRecord, JobSnapshot, JobSpec, JobStatus};

/// State shared between the [`Scheduler`] handle, the dispatcher task and
/// the workers.
#[derive(Debug)]
pub(crate) struct SchedulerCore {
    pub(crate) config: SchedulerConfig,
    pub(crate) registry: JobRegistry,
    pub(crate) queue: ReadyQueue,
    /// Worker pool slots.
    pub(crate) workers: Arc<Semaphore>,
    /// Cleared by `shutdown`; submissions are refused afterwards.
    accepting: AtomicBool,
    /// Set by `start`, cleared by `shutdown`. The dispatcher exits once this
    /// is false and no work is queued or in flight.
    running: AtomicBool,
    next_seq: AtomicU64,
    next_auto_id: AtomicU64,
}

impl SchedulerCore {
    fn new(config: SchedulerConfig) -> Self {
        let workers = config.workers.max(1);
        Self {
            config: SchedulerConfig { workers, ..config },
            registry: JobRegistry::new(),
            queue: ReadyQueue::new(),
            workers: Arc::new(Semaphore::new(workers)),
            accepting: AtomicBool::new(true),
            running: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
            next_auto_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn propagator(&self) -> ReadinessPropagator<'_> {
        ReadinessPropagator::new(&self.registry, &self.queue, self.config.failure_policy)
    }

    /// Next free `job-<n>` ID. Skips IDs a caller already claimed.
    fn generate_id(&self) -> JobId {
        loop {
            let n = self.next_auto_id.fetch_add(1, Ordering::Relaxed) + 1;
            let id = JobId::new(format!("job-{n}"));
            if !self.registry.contains(&id) {
                return id;
            }
        }
    }
}

/// Dependency-aware, priority-ordered job scheduler.
///
/// ```ignore
/// let scheduler = Scheduler::new(SchedulerConfig::default().with_workers(2));
/// let fetch = scheduler.submit(JobSpec::new(|| async { Ok(()) }).priority(5))?;
/// let build = scheduler.submit(JobSpec::new(|| async { Ok(()) }).after(&fetch))?;
/// scheduler.start();
/// scheduler.wait_for(&build, None).await?;
/// scheduler.shutdown(Duration::from_secs(5)).await?;
/// ```
///
/// Jobs may be submitted before [`start`](Self::start); they queue up and are
/// dispatched by priority once the dispatcher runs. `start` and `shutdown`
/// must be called from within a Tokio runtime.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.core.config)
            .field("jobs", &self.core.registry.len())
            .field("ready", &self.core.queue.len())
            .field("running", &self.core.is_running())
            .finish_non_exhaustive()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(config)),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Spawn the dispatcher loop. Calling it again, or after shutdown, is a
    /// no-op.
    pub fn start(&self) {
        let mut slot = lock(&self.dispatcher);

        if slot.is_some() || !self.core.accepting.load(Ordering::SeqCst) {
            warn!("scheduler already started or shut down; ignoring start");
            return;
        }

        self.core.running.store(true, Ordering::SeqCst);
        *slot = Some(tokio::spawn(dispatcher::run_dispatcher(Arc::clone(
            &self.core,
        ))));
    }

    /// Submit a job. Never waits on other jobs.
    ///
    /// A job with no dependencies (or whose dependencies have all finished
    /// already) is Ready on return; otherwise it is Pending until the last
    /// dependency finishes.
    pub fn submit(&self, spec: JobSpec) -> Result<JobId> {
        if !self.core.accepting.load(Ordering::SeqCst) {
            return Err(JobdagError::SchedulerShutdown);
        }

        let JobSpec {
            id,
            priority,
            dependencies,
            body,
        } = spec;

        let id = id.unwrap_or_else(|| self.core.generate_id());
        let seq = self.core.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = JobRecord::new(id.clone(), priority, seq, dependencies, body);

        // Checked again under the registry lock: `shutdown` clears the flag
        // before it sweeps the registry, so a job admitted here is either
        // dispatched or forced to a terminal state by that sweep.
        let accepting = &self.core.accepting;
        let job = self
            .core
            .registry
            .insert_if_open(record, || accepting.load(Ordering::SeqCst))
            .inspect_err(|err| {
                warn!(job = %id, error = %err, "rejected job submission");
            })?;

        // A dependency may have finished before the edge was registered, in
        // which case no later propagation would visit this job.
        self.core.propagator().evaluate(&job);

        info!(
            job = %id,
            priority,
            deps = ?job.dependencies(),
            status = %job.status(),
            "submitted job"
        );

        Ok(id)
    }

    /// Non-blocking status read.
    pub fn status(&self, id: &str) -> Result<JobStatus> {
        Ok(self.record(id)?.status())
    }

    /// Non-blocking read of everything the scheduler knows about a job.
    pub fn snapshot(&self, id: &str) -> Result<JobSnapshot> {
        Ok(self.record(id)?.snapshot())
    }

    /// Snapshots of every job, in submission order.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.core
            .registry
            .all()
            .iter()
            .map(|job| job.snapshot())
            .collect()
    }

    /// Current status, or the captured error for a job that failed.
    pub fn outcome(&self, id: &str) -> Result<JobStatus> {
        let job = self.record(id)?;
        match job.status() {
            JobStatus::Failed => Err(JobdagError::JobExecutionFailure {
                job: job.id().clone(),
                reason: job.error().unwrap_or_else(|| "unknown error".to_string()),
            }),
            status => Ok(status),
        }
    }

    /// Wait for a job to reach a terminal state.
    ///
    /// Returns `true` if it did before `timeout` elapsed; `None` waits
    /// forever. Any number of callers may wait on the same job.
    pub async fn wait_for(&self, id: &str, timeout: Option<Duration>) -> Result<bool> {
        let job = self.record(id)?;
        Ok(job.signal().wait_timeout(timeout).await)
    }

    /// Cancel a job that has not started running.
    ///
    /// Returns `false` if the job is already running or finished. Dependents
    /// are re-evaluated according to the failure policy.
    pub fn cancel(&self, id: &str) -> Result<bool> {
        let job = self.record(id)?;

        let previous = job.transition_if(
            |s| matches!(s, JobStatus::Pending | JobStatus::Ready),
            JobStatus::Cancelled,
            None,
        );

        match previous {
            Some(previous) => {
                info!(job = %job.id(), %previous, "cancelled job");
                job.signal().fire();
                self.core.propagator().on_job_finished(job.id());
                Ok(true)
            }
            None => {
                debug!(job = %job.id(), status = %job.status(), "job not cancellable");
                Ok(false)
            }
        }
    }

    /// Number of entries waiting in the ready queue.
    pub fn ready_len(&self) -> usize {
        self.core.queue.len()
    }

    /// Whether the dispatcher has been started and not shut down.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Stop accepting work and wind the scheduler down.
    ///
    /// The dispatcher keeps draining the ready queue and in-flight jobs for
    /// up to `timeout`. After that, running bodies are aborted and marked
    /// Failed, and jobs that never started are Cancelled. Returns
    /// [`JobdagError::ShutdownTimeout`] if the timeout forced anything.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.core.accepting.store(false, Ordering::SeqCst);
        self.core.running.store(false, Ordering::SeqCst);
        info!(?timeout, "scheduler shutting down");

        let handle = lock(&self.dispatcher).take();
        let drained = match handle {
            Some(mut handle) => match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => true,
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "dispatcher task ended abnormally");
                    true
                }
                Err(_elapsed) => {
                    // Dropping the dispatcher's worker set aborts the workers.
                    handle.abort();
                    false
                }
            },
            None => true,
        };

        let forced = self.force_remaining();

        if drained {
            if forced > 0 {
                info!(cancelled = forced, "cancelled jobs that never became runnable");
            }
            info!("scheduler shut down");
            Ok(())
        } else {
            warn!(?timeout, forced, "shutdown timed out; forced remaining jobs");
            Err(JobdagError::ShutdownTimeout { timeout, forced })
        }
    }

    /// Move every non-terminal job to a terminal state. Returns how many
    /// jobs were affected.
    fn force_remaining(&self) -> usize {
        let mut forced = 0;

        for job in self.core.registry.all() {
            let aborted = job
                .transition_if(
                    |s| s == JobStatus::Running,
                    JobStatus::Failed,
                    Some("aborted by scheduler shutdown".to_string()),
                )
                .is_some();

            if aborted {
                job.abort();
                warn!(job = %job.id(), "aborted running job at shutdown");
            } else if job
                .transition_if(
                    |s| matches!(s, JobStatus::Pending | JobStatus::Ready),
                    JobStatus::Cancelled,
                    None,
                )
                .is_none()
            {
                continue;
            }

            job.signal().fire();
            forced += 1;
        }

        forced
    }

    fn record(&self, id: &str) -> Result<Arc<JobRecord>> {
        self.core
            .registry
            .get(id)
            .ok_or_else(|| JobdagError::NotFound(JobId::from(id)))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.dispatcher).take() {
            handle.abort();
        }
    }
}
