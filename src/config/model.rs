// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::SchedulerConfig;
use crate::types::FailurePolicy;

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// workers = 2
/// failure_policy = "cascade"
///
/// [job.fetch]
/// cmd = "git fetch"
/// priority = 10
///
/// [job.build]
/// cmd = "cargo build"
/// after = ["fetch"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Scheduler settings from `[config]`.
    #[serde(default)]
    pub config: SchedulerSection,

    /// All jobs from `[job.<name>]`. The name becomes the job ID.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated plan file.
///
/// Only constructed through `TryFrom<RawPlanFile>`, so every `after`
/// reference is known and the graph is acyclic.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: SchedulerSection,
    pub job: BTreeMap<String, JobConfig>,
    /// Job names in dependency order.
    order: Vec<String>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        config: SchedulerSection,
        job: BTreeMap<String, JobConfig>,
        order: Vec<String>,
    ) -> Self {
        Self { config, job, order }
    }

    /// Job names ordered so that every job comes after its dependencies.
    ///
    /// Submitting in this order never references a job that is not yet
    /// registered.
    pub fn submission_order(&self) -> &[String] {
        &self.order
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Worker pool size.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Dispatcher poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long shutdown waits for running jobs before forcing them.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// `"cascade"` (default) or `"continue"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_workers() -> usize {
    crate::engine::DEFAULT_WORKERS
}

fn default_poll_interval_ms() -> u64 {
    crate::engine::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SchedulerSection {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl From<&SchedulerSection> for SchedulerConfig {
    fn from(section: &SchedulerSection) -> Self {
        SchedulerConfig {
            workers: section.workers,
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            failure_policy: section.failure_policy,
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Higher runs first among ready jobs.
    #[serde(default)]
    pub priority: i64,

    /// Jobs that must finish before this one starts (`after = ["A", "B"]`).
    #[serde(default)]
    pub after: Vec<String>,
}
