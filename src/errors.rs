// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug)]
pub enum JobdagError {
    #[error("Unknown dependency '{dependency}' for job '{job}'")]
    UnknownDependency { job: JobId, dependency: JobId },

    #[error("Circular dependency: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<JobId> },

    #[error("Job already exists: {0}")]
    DuplicateJob(JobId),

    #[error("Job '{job}' failed: {reason}")]
    JobExecutionFailure { job: JobId, reason: String },

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Scheduler has been shut down")]
    SchedulerShutdown,

    #[error("Shutdown did not drain within {timeout:?}; forced {forced} job(s)")]
    ShutdownTimeout { timeout: Duration, forced: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_cycle(cycle: &[JobId]) -> String {
    cycle
        .iter()
        .map(JobId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobdagError>;
