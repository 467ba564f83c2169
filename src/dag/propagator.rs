// src/dag/propagator.rs

//! Readiness propagation: promotes Pending jobs once their dependencies
//! finish, and cascades upstream failures.

use tracing::{debug, info, warn};

use crate::dag::JobRegistry;
use crate::engine::ReadyQueue;
use crate::job::{JobId, JobRecord, JobStatus};
use crate::types::FailurePolicy;

/// Result of checking a Pending job's dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    /// At least one dependency has not finished yet.
    Waiting,
    /// Every dependency is satisfied under the active policy.
    Satisfied,
    /// A dependency ended badly and the policy cascades it.
    Blocked { status: JobStatus, by: JobId },
}

/// Borrowed view over the registry and ready queue that applies the
/// readiness rules.
///
/// Every promotion is a compare-and-set on the job's status, so any number of
/// propagations racing over the same Pending job enqueue it at most once.
pub struct ReadinessPropagator<'a> {
    registry: &'a JobRegistry,
    queue: &'a ReadyQueue,
    policy: FailurePolicy,
}

impl<'a> ReadinessPropagator<'a> {
    pub fn new(registry: &'a JobRegistry, queue: &'a ReadyQueue, policy: FailurePolicy) -> Self {
        Self {
            registry,
            queue,
            policy,
        }
    }

    /// Re-evaluate the dependents of a job that just reached a terminal state.
    ///
    /// Only dependents of `finished` can change readiness, so this walks the
    /// reverse adjacency instead of every Pending job. Jobs that become
    /// terminal through a cascade are walked in turn.
    pub fn on_job_finished(&self, finished: &JobId) {
        let mut stack = vec![finished.clone()];

        while let Some(id) = stack.pop() {
            for dependent in self.registry.dependents_of(&id) {
                if let Some(status) = self.evaluate(&dependent) {
                    if status.is_terminal() {
                        stack.push(dependent.id().clone());
                    }
                }
            }
        }
    }

    /// Evaluate a single Pending job. Returns its new status if this call
    /// changed it.
    pub fn evaluate(&self, job: &JobRecord) -> Option<JobStatus> {
        if job.status() != JobStatus::Pending {
            return None;
        }

        match self.readiness(job) {
            Readiness::Waiting => None,
            Readiness::Satisfied => {
                if !job.transition(JobStatus::Pending, JobStatus::Ready) {
                    // Another propagation won the race.
                    return None;
                }
                debug!(
                    job = %job.id(),
                    priority = job.priority(),
                    "dependencies satisfied; marking Ready"
                );
                self.queue.push(job);
                Some(JobStatus::Ready)
            }
            Readiness::Blocked { status, by } => {
                let reason = format!("dependency '{by}' did not complete");
                job.transition_if(|s| s == JobStatus::Pending, status, Some(reason))?;
                info!(
                    job = %job.id(),
                    dependency = %by,
                    %status,
                    "upstream dependency did not complete; cascading"
                );
                job.signal().fire();
                Some(status)
            }
        }
    }

    fn readiness(&self, job: &JobRecord) -> Readiness {
        let mut waiting = false;

        for dep_id in job.dependencies() {
            let Some(dep) = self.registry.get(dep_id) else {
                // Registration rejects unknown dependencies; be defensive.
                warn!(job = %job.id(), dep = %dep_id, "dependency missing from registry");
                return Readiness::Waiting;
            };

            match (dep.status(), self.policy) {
                (JobStatus::Completed, _) => {}
                (JobStatus::Failed, FailurePolicy::Continue)
                | (JobStatus::Cancelled, FailurePolicy::Continue) => {}
                (JobStatus::Failed, FailurePolicy::Cascade) => {
                    return Readiness::Blocked {
                        status: JobStatus::Failed,
                        by: dep_id.clone(),
                    };
                }
                (JobStatus::Cancelled, FailurePolicy::Cascade) => {
                    return Readiness::Blocked {
                        status: JobStatus::Cancelled,
                        by: dep_id.clone(),
                    };
                }
                (JobStatus::Pending | JobStatus::Ready | JobStatus::Running, _) => {
                    waiting = true;
                }
            }
        }

        if waiting {
            Readiness::Waiting
        } else {
            Readiness::Satisfied
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn add(registry: &JobRegistry, id: &str, seq: u64, deps: &[&str]) -> Arc<JobRecord> {
        registry
            .insert(JobRecord::new(
                JobId::from(id),
                0,
                seq,
                deps.iter().map(|d| JobId::from(*d)).collect(),
                crate::job::JobSpec::new(|| async { Ok(()) }).body,
            ))
            .unwrap()
    }

    fn finish(job: &JobRecord, status: JobStatus) {
        job.transition(JobStatus::Pending, JobStatus::Ready);
        job.transition(JobStatus::Ready, JobStatus::Running);
        job.transition_if(|_| true, status, Some("test".to_string()));
        job.signal().fire();
    }

    #[test]
    fn promotes_only_when_all_dependencies_complete() {
        let registry = JobRegistry::new();
        let queue = ReadyQueue::new();
        let a = add(&registry, "a", 0, &[]);
        let b = add(&registry, "b", 1, &[]);
        let c = add(&registry, "c", 2, &["a", "b"]);
        let propagator = ReadinessPropagator::new(&registry, &queue, FailurePolicy::Cascade);

        finish(&a, JobStatus::Completed);
        propagator.on_job_finished(a.id());
        assert_eq!(c.status(), JobStatus::Pending);
        assert!(queue.is_empty());

        finish(&b, JobStatus::Completed);
        propagator.on_job_finished(b.id());
        assert_eq!(c.status(), JobStatus::Ready);
        assert_eq!(queue.try_pop().as_deref(), Some("c"));
    }

    #[test]
    fn repeated_propagation_enqueues_once() {
        let registry = JobRegistry::new();
        let queue = ReadyQueue::new();
        let a = add(&registry, "a", 0, &[]);
        let b = add(&registry, "b", 1, &[]);
        add(&registry, "c", 2, &["a", "b"]);
        let propagator = ReadinessPropagator::new(&registry, &queue, FailurePolicy::Cascade);

        finish(&a, JobStatus::Completed);
        finish(&b, JobStatus::Completed);
        propagator.on_job_finished(a.id());
        propagator.on_job_finished(b.id());

        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn cascade_fails_transitive_dependents() {
        let registry = JobRegistry::new();
        let queue = ReadyQueue::new();
        let a = add(&registry, "a", 0, &[]);
        let b = add(&registry, "b", 1, &["a"]);
        let c = add(&registry, "c", 2, &["b"]);
        let propagator = ReadinessPropagator::new(&registry, &queue, FailurePolicy::Cascade);

        finish(&a, JobStatus::Failed);
        propagator.on_job_finished(a.id());

        assert_eq!(b.status(), JobStatus::Failed);
        assert_eq!(c.status(), JobStatus::Failed);
        assert!(b.signal().is_fired());
        assert!(c.error().unwrap().contains("'b'"));
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_dependency_cascades_as_cancellation() {
        let registry = JobRegistry::new();
        let queue = ReadyQueue::new();
        let a = add(&registry, "a", 0, &[]);
        let b = add(&registry, "b", 1, &["a"]);
        let propagator = ReadinessPropagator::new(&registry, &queue, FailurePolicy::Cascade);

        a.transition(JobStatus::Pending, JobStatus::Cancelled);
        propagator.on_job_finished(a.id());

        assert_eq!(b.status(), JobStatus::Cancelled);
    }

    #[test]
    fn continue_policy_promotes_after_failure() {
        let registry = JobRegistry::new();
        let queue = ReadyQueue::new();
        let a = add(&registry, "a", 0, &[]);
        let b = add(&registry, "b", 1, &["a"]);
        let propagator = ReadinessPropagator::new(&registry, &queue, FailurePolicy::Continue);

        finish(&a, JobStatus::Failed);
        propagator.on_job_finished(a.id());

        assert_eq!(b.status(), JobStatus::Ready);
        assert_eq!(queue.len(), 1);
    }
}
