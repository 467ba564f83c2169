// src/job/spec.rs

//! Caller-facing description of a job to submit.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;

use crate::job::JobId;

/// Future returned by a job body.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Opaque unit of work. Called at most once, by the worker that runs the job.
pub type JobBody = Box<dyn FnOnce() -> JobFuture + Send + 'static>;

/// A job waiting to be submitted: body, priority, dependencies and an optional
/// caller-chosen ID.
///
/// ```ignore
/// let spec = JobSpec::new(|| async { Ok(()) })
///     .priority(10)
///     .after(&fetch_id);
/// ```
pub struct JobSpec {
    pub(crate) id: Option<JobId>,
    pub(crate) priority: i64,
    pub(crate) dependencies: Vec<JobId>,
    pub(crate) body: JobBody,
}

impl JobSpec {
    /// Build a spec from an async body.
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: None,
            priority: 0,
            dependencies: Vec::new(),
            body: Box::new(move || Box::pin(body())),
        }
    }

    /// Build a spec from a synchronous body, run on Tokio's blocking pool.
    pub fn blocking<F>(body: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::new(move || async move {
            match tokio::task::spawn_blocking(body).await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => Err(anyhow!("job body panicked")),
                Err(join_err) => Err(anyhow!(join_err)),
            }
        })
    }

    /// Use a caller-chosen ID instead of an auto-generated `job-<n>`.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Higher runs first among ready jobs. Defaults to 0.
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Add one dependency.
    pub fn after(mut self, dependency: impl Into<JobId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Add several dependencies.
    pub fn after_all<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<JobId>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
