// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

use crate::job::{lock, JobId, JobRecord};

/// Heap entry. Ordered so that the max-heap pops the highest priority first,
/// and among equal priorities the earliest submission.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadyEntry {
    priority: i64,
    seq: u64,
    id: JobId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority-ordered queue of job IDs whose dependencies are satisfied.
///
/// Semantics:
/// - Producers (submission, propagation) call [`push`](Self::push) from any
///   thread without blocking on the consumer.
/// - The single consumer (the dispatcher) calls
///   [`pop_timeout`](Self::pop_timeout), which waits up to the given duration
///   for an entry so the caller can periodically re-check shutdown.
/// - Entries hold only IDs; the registry owns all mutable job state. An entry
///   whose job was cancelled while queued is still popped, and the dispatcher
///   drops it after checking the job's status.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<ReadyEntry>>,
    notify: Notify,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job using its priority and submission order.
    pub fn push(&self, job: &JobRecord) {
        self.push_entry(job.id().clone(), job.priority(), job.seq());
    }

    fn push_entry(&self, id: JobId, priority: i64, seq: u64) {
        trace!(job = %id, priority, "enqueued ready job");
        lock(&self.heap).push(ReadyEntry { priority, seq, id });
        // Stores a permit if the consumer is not currently waiting.
        self.notify.notify_one();
    }

    /// Pop the highest-priority entry without waiting.
    pub fn try_pop(&self) -> Option<JobId> {
        lock(&self.heap).pop().map(|entry| entry.id)
    }

    /// Pop the highest-priority entry, waiting up to `wait` for one to arrive.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<JobId> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(id) = self.try_pop() {
                return Some(id);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.heap).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.heap).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn push(queue: &ReadyQueue, id: &str, priority: i64, seq: u64) {
        queue.push_entry(JobId::from(id), priority, seq);
    }

    fn drain(queue: &ReadyQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.try_pop())
            .map(|id| id.to_string())
            .collect()
    }

    #[test]
    fn pops_highest_priority_first() {
        let queue = ReadyQueue::new();
        push(&queue, "low", 1, 0);
        push(&queue, "high", 10, 1);
        push(&queue, "mid", 5, 2);

        assert_eq!(drain(&queue), vec!["high", "mid", "low"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_priorities_pop_in_submission_order() {
        let queue = ReadyQueue::new();
        push(&queue, "third", 3, 7);
        push(&queue, "first", 3, 2);
        push(&queue, "second", 3, 5);
        push(&queue, "urgent", 4, 9);

        assert_eq!(drain(&queue), vec!["urgent", "first", "second", "third"]);
    }

    #[test]
    fn negative_priorities_sort_below_zero() {
        let queue = ReadyQueue::new();
        push(&queue, "neg", -5, 0);
        push(&queue, "zero", 0, 1);

        assert_eq!(drain(&queue), vec!["zero", "neg"]);
    }

    #[tokio::test]
    async fn pop_timeout_returns_none_when_empty() {
        let queue = ReadyQueue::new();
        let start = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)).await, None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn pop_timeout_wakes_on_push() {
        let queue = Arc::new(ReadyQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        push(&queue, "late", 0, 0);

        let popped = consumer.await.unwrap();
        assert_eq!(popped.as_deref(), Some("late"));
    }
}
