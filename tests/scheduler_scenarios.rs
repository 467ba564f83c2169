// tests/scheduler_scenarios.rs

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use jobdag::dag::find_cycle;
use jobdag::{JobId, JobSpec, JobStatus, JobdagError, Scheduler, SchedulerConfig};
use jobdag_test_utils::probe::{JobProbe, ProbeEvent};
use jobdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const WAIT: Option<Duration> = Some(Duration::from_secs(3));

fn scheduler(workers: usize) -> Scheduler {
    Scheduler::new(
        SchedulerConfig::default()
            .with_workers(workers)
            .with_poll_interval(Duration::from_millis(10)),
    )
}

async fn wait_until_started(probe: &JobProbe, name: &str) {
    with_timeout(async {
        while probe.run_count(name) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn independent_job_is_ready_then_completed() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(2);

    let x = scheduler.submit(probe.job("x").priority(5))?;
    assert_eq!(scheduler.status(&x)?, JobStatus::Ready);

    scheduler.start();
    assert!(scheduler.wait_for(&x, WAIT).await?);
    assert_eq!(scheduler.status(&x)?, JobStatus::Completed);

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn dependent_stays_pending_until_dependency_completes() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let gate = Arc::new(Notify::new());
    let scheduler = scheduler(2);

    let a = scheduler.submit(probe.gated_job("a", Arc::clone(&gate)))?;
    let b = scheduler.submit(probe.job("b").after(&a))?;
    assert_eq!(scheduler.status(&b)?, JobStatus::Pending);

    scheduler.start();
    wait_until_started(&probe, "a").await;
    assert_eq!(scheduler.status(&a)?, JobStatus::Running);
    assert_eq!(scheduler.status(&b)?, JobStatus::Pending);

    gate.notify_one();
    assert!(scheduler.wait_for(&b, WAIT).await?);
    assert_eq!(scheduler.status(&a)?, JobStatus::Completed);
    assert_eq!(scheduler.status(&b)?, JobStatus::Completed);

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn job_with_two_dependencies_starts_after_both() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(4);

    let a = scheduler.submit(probe.sleeping_job("a", Duration::from_millis(20)))?;
    let b = scheduler.submit(probe.sleeping_job("b", Duration::from_millis(10)).after(&a))?;
    let c = scheduler.submit(probe.job("c").after_all([&a, &b]))?;

    scheduler.start();
    assert!(scheduler.wait_for(&c, WAIT).await?);

    let c_start = probe.position(&ProbeEvent::Started("c".into())).unwrap();
    assert!(probe.position(&ProbeEvent::Finished("a".into())).unwrap() < c_start);
    assert!(probe.position(&ProbeEvent::Finished("b".into())).unwrap() < c_start);

    let c_started = scheduler.snapshot(&c)?.started_at.unwrap();
    for dep in [&a, &b] {
        assert!(scheduler.snapshot(dep)?.finished_at.unwrap() <= c_started);
    }

    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[test]
fn closing_a_cycle_is_rejected() {
    // "a" depends on "b"; a new "b" depending on "a" would close the loop.
    let edges: HashMap<JobId, Vec<JobId>> =
        HashMap::from([(JobId::from("a"), vec![JobId::from("b")])]);

    let cycle = find_cycle(&JobId::from("b"), &[JobId::from("a")], |id| {
        edges.get(id).map(Vec::as_slice).unwrap_or_default()
    });

    let cycle: Vec<_> = cycle.unwrap().iter().map(|id| id.to_string()).collect();
    assert_eq!(cycle, vec!["b", "a", "b"]);
}

#[tokio::test]
async fn job_behind_unfinished_dependency_stays_pending_until_cancelled() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(1);

    // Never started: "b" cannot finish, so "a" waits indefinitely.
    let b = scheduler.submit(probe.job("b").with_id("b"))?;
    let a = scheduler.submit(probe.job("a").with_id("a").after(&b))?;

    assert!(!scheduler.wait_for(&a, Some(Duration::from_millis(50))).await?);
    assert_eq!(scheduler.status(&a)?, JobStatus::Pending);

    assert!(scheduler.cancel(&a)?);
    assert!(scheduler.wait_for(&a, WAIT).await?);
    assert_eq!(scheduler.status(&a)?, JobStatus::Cancelled);
    assert_eq!(scheduler.status(&b)?, JobStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn shutdown_forces_stuck_job_after_timeout() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(1);

    let stuck = scheduler.submit(probe.stuck_job("stuck").priority(10))?;
    let queued = scheduler.submit(probe.job("queued"))?;

    scheduler.start();
    wait_until_started(&probe, "stuck").await;

    let start = Instant::now();
    let result = with_timeout(scheduler.shutdown(Duration::from_secs(1))).await;
    let elapsed = start.elapsed();

    match result {
        Err(JobdagError::ShutdownTimeout { forced, .. }) => assert_eq!(forced, 2),
        other => panic!("expected ShutdownTimeout, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));

    let snap = scheduler.snapshot(&stuck)?;
    assert_eq!(snap.status, JobStatus::Failed);
    assert!(snap.error.unwrap().contains("shutdown"));
    assert_eq!(scheduler.status(&queued)?, JobStatus::Cancelled);
    assert!(scheduler.wait_for(&stuck, WAIT).await?);
    assert_eq!(probe.run_count("queued"), 0);
    Ok(())
}

#[tokio::test]
async fn single_worker_runs_ready_jobs_by_descending_priority() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(1);

    let mut ids = Vec::new();
    for priority in [3, 9, 1, 7, 5] {
        let name = format!("p{priority}");
        ids.push(scheduler.submit(probe.job(&name).priority(priority))?);
    }

    scheduler.start();
    for id in &ids {
        assert!(scheduler.wait_for(id, WAIT).await?);
    }

    assert_eq!(probe.started(), vec!["p9", "p7", "p5", "p3", "p1"]);
    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn equal_priorities_run_in_submission_order() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(1);

    let mut ids = Vec::new();
    for name in ["first", "second", "third"] {
        ids.push(scheduler.submit(probe.job(name).priority(2))?);
    }
    ids.push(scheduler.submit(probe.job("urgent").priority(3))?);

    scheduler.start();
    for id in &ids {
        assert!(scheduler.wait_for(id, WAIT).await?);
    }

    assert_eq!(probe.started(), vec!["urgent", "first", "second", "third"]);
    scheduler.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}

#[tokio::test]
async fn graceful_shutdown_drains_ready_queue() -> TestResult {
    init_tracing();
    let probe = JobProbe::new();
    let scheduler = scheduler(2);

    let a = scheduler.submit(probe.sleeping_job("a", Duration::from_millis(30)))?;
    let b = scheduler.submit(probe.job("b").after(&a))?;

    scheduler.start();
    scheduler.shutdown(Duration::from_secs(2)).await?;

    assert_eq!(scheduler.status(&a)?, JobStatus::Completed);
    assert_eq!(scheduler.status(&b)?, JobStatus::Completed);
    assert!(!scheduler.is_running());
    Ok(())
}

#[test]
fn long_dependency_chain_is_accepted_and_cascades() {
    const LEN: usize = 50_000;
    let scheduler = Scheduler::default();

    let first = scheduler
        .submit(JobSpec::new(|| async { Ok(()) }))
        .unwrap();
    let mut prev = first.clone();
    for _ in 1..LEN {
        prev = scheduler
            .submit(JobSpec::new(|| async { Ok(()) }).after(&prev))
            .unwrap();
    }

    assert_eq!(scheduler.jobs().len(), LEN);
    assert_eq!(scheduler.status(&first).unwrap(), JobStatus::Ready);
    assert_eq!(scheduler.status(&prev).unwrap(), JobStatus::Pending);

    // Cancelling the head walks the whole chain.
    assert!(scheduler.cancel(&first).unwrap());
    assert_eq!(scheduler.status(&prev).unwrap(), JobStatus::Cancelled);
}
