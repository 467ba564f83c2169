// src/lib.rs

//! Dependency-aware, priority-ordered concurrent job scheduler.
//!
//! The library surface is [`Scheduler`]: submit [`JobSpec`]s with a priority
//! and dependencies, start the dispatcher, then query, wait on, cancel, and
//! finally shut down. The `jobdag` binary drives it from a TOML plan of shell
//! commands.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

pub use crate::engine::{Scheduler, SchedulerConfig};
pub use crate::errors::JobdagError;
pub use crate::job::{JobId, JobSnapshot, JobSpec, JobStatus};
pub use crate::types::FailurePolicy;

use crate::cli::CliArgs;
use crate::config::{load_and_validate, PlanFile};
use crate::exec::shell_job;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - scheduler construction and job submission
/// - waiting for every job (or Ctrl-C)
/// - shutdown and the final summary
pub async fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate(&args.plan)?;

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(());
    }

    let config = scheduler_config(&args, &plan);
    let shutdown_timeout = args
        .shutdown_timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| plan.config.shutdown_timeout());

    let scheduler = Arc::new(Scheduler::new(config));
    let ids = submit_plan(&scheduler, &plan)?;

    scheduler.start();
    info!(jobs = ids.len(), workers = scheduler.config().workers, "plan started");

    let wait_all = {
        let scheduler = Arc::clone(&scheduler);
        let ids = ids.clone();
        async move {
            for id in &ids {
                scheduler.wait_for(id, None).await?;
            }
            Ok::<_, JobdagError>(())
        }
    };

    tokio::select! {
        res = wait_all => res?,
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => warn!("Ctrl-C received; shutting down"),
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C; shutting down"),
            }
        }
    }

    let shutdown = scheduler.shutdown(shutdown_timeout).await;
    let jobs = scheduler.jobs();
    print_summary(&jobs);
    shutdown?;

    let unfinished = jobs
        .iter()
        .filter(|job| job.status != JobStatus::Completed)
        .count();
    if unfinished > 0 {
        bail!("{unfinished} of {} job(s) did not complete", jobs.len());
    }

    Ok(())
}

/// Plan settings with command-line overrides applied.
pub fn scheduler_config(args: &CliArgs, plan: &PlanFile) -> SchedulerConfig {
    let mut config = SchedulerConfig::from(&plan.config);
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    config
}

/// Submit every plan job in dependency order, using job names as IDs.
pub fn submit_plan(scheduler: &Scheduler, plan: &PlanFile) -> Result<Vec<JobId>> {
    let mut ids = Vec::with_capacity(plan.job.len());

    for name in plan.submission_order() {
        let Some(job) = plan.job.get(name) else {
            bail!("plan order references unknown job '{name}'");
        };

        let spec = shell_job(name, &job.cmd)
            .with_id(name.as_str())
            .priority(job.priority)
            .after_all(job.after.iter().map(String::as_str));

        ids.push(scheduler.submit(spec)?);
    }

    Ok(ids)
}

/// Simple dry-run output: print jobs in submission order.
fn print_dry_run(plan: &PlanFile) {
    println!("jobdag dry-run");
    println!("  config.workers = {}", plan.config.workers);
    println!("  config.failure_policy = {:?}", plan.config.failure_policy);
    println!("  config.poll_interval_ms = {}", plan.config.poll_interval_ms);
    println!(
        "  config.shutdown_timeout_secs = {}",
        plan.config.shutdown_timeout_secs
    );
    println!();

    println!("jobs ({}):", plan.job.len());
    for name in plan.submission_order() {
        let Some(job) = plan.job.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", job.cmd);
        println!("      priority: {}", job.priority);
        if !job.after.is_empty() {
            println!("      after: {:?}", job.after);
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_summary(jobs: &[JobSnapshot]) {
    println!("jobdag summary:");
    for job in jobs {
        let elapsed = match (job.started_at, job.finished_at) {
            (Some(start), Some(end)) => format!(" in {:.2?}", end.duration_since(start)),
            _ => String::new(),
        };
        match &job.error {
            Some(err) => println!("  {:<20} {}{elapsed}: {err}", job.id.as_str(), job.status),
            None => println!("  {:<20} {}{elapsed}", job.id.as_str(), job.status),
        }
    }
}
