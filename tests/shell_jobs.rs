// tests/shell_jobs.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::time::Duration;

use jobdag::exec::shell_job;
use jobdag::{submit_plan, JobStatus, Scheduler, SchedulerConfig};
use jobdag_test_utils::builders::{JobConfigBuilder, PlanBuilder};
use jobdag_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn scheduler(workers: usize) -> Scheduler {
    Scheduler::new(
        SchedulerConfig::default()
            .with_workers(workers)
            .with_poll_interval(Duration::from_millis(10)),
    )
}

#[tokio::test]
async fn shell_job_exit_status_decides_the_outcome() -> TestResult {
    init_tracing();
    let scheduler = scheduler(2);

    let ok = scheduler.submit(shell_job("ok", "echo hello"))?;
    let bad = scheduler.submit(shell_job("bad", "echo oops >&2; exit 3"))?;

    scheduler.start();
    assert!(scheduler.wait_for(&ok, WAIT).await?);
    assert!(scheduler.wait_for(&bad, WAIT).await?);

    assert_eq!(scheduler.status(&ok)?, JobStatus::Completed);
    let error = scheduler.snapshot(&bad)?.error.unwrap();
    assert!(error.contains("exited with code 3"), "{error}");

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn plan_jobs_run_after_their_dependencies() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("order.log");
    let append = |word: &str| format!("echo {word} >> '{}'", log.display());

    let plan = PlanBuilder::new()
        .workers(3)
        .with_job("compile", JobConfigBuilder::new(&append("compile")).after("fetch").build())
        .with_job("fetch", JobConfigBuilder::new(&append("fetch")).build())
        .with_job(
            "test",
            JobConfigBuilder::new(&append("test"))
                .priority(5)
                .after("compile")
                .build(),
        )
        .build();

    let scheduler = scheduler(plan.config.workers);
    let ids = submit_plan(&scheduler, &plan)?;
    assert_eq!(ids.len(), 3);
    assert_eq!(scheduler.status("fetch")?, JobStatus::Ready);
    assert_eq!(scheduler.status("compile")?, JobStatus::Pending);

    scheduler.start();
    for id in &ids {
        assert!(scheduler.wait_for(id, WAIT).await?);
        assert_eq!(scheduler.status(id)?, JobStatus::Completed);
    }

    let lines: Vec<String> = fs::read_to_string(&log)?
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines, ["fetch", "compile", "test"]);

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn failing_plan_job_cascades_to_its_dependents() -> TestResult {
    init_tracing();
    let plan = PlanBuilder::new()
        .with_job("lint", JobConfigBuilder::new("false").build())
        .with_job("package", JobConfigBuilder::new("true").after("lint").build())
        .build();

    let scheduler = scheduler(2);
    submit_plan(&scheduler, &plan)?;
    scheduler.start();

    assert!(scheduler.wait_for("package", WAIT).await?);
    assert_eq!(scheduler.status("lint")?, JobStatus::Failed);
    assert_eq!(scheduler.status("package")?, JobStatus::Failed);

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}
