// src/dag/registry.rs

//! Concurrent job map: the single source of truth for job status.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::dag::graph::find_cycle;
use crate::errors::{JobdagError, Result};
use crate::job::{JobId, JobRecord};

#[derive(Debug, Default)]
struct RegistryInner {
    jobs: HashMap<JobId, Arc<JobRecord>>,
    /// Reverse adjacency: dependency -> jobs that list it.
    dependents: HashMap<JobId, Vec<JobId>>,
}

/// Map from job ID to [`JobRecord`].
///
/// Entries are never removed. Structural changes (inserting a job and its
/// edges) happen under one write lock; status changes happen per record and
/// never take the registry lock.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and insert a new job, all or nothing.
    ///
    /// Rejects duplicate IDs, dependencies that are not registered yet, and
    /// edges that would close a cycle. On error the registry is unchanged.
    pub fn insert(&self, record: JobRecord) -> Result<Arc<JobRecord>> {
        self.insert_if_open(record, || true)
    }

    /// Like [`insert`](Self::insert), but first checks `open` under the
    /// write lock and fails with [`JobdagError::SchedulerShutdown`] if it
    /// returns false.
    ///
    /// Anything that flips `open` to false and then reads the registry is
    /// guaranteed to see every job admitted before the flip.
    pub fn insert_if_open(
        &self,
        record: JobRecord,
        open: impl FnOnce() -> bool,
    ) -> Result<Arc<JobRecord>> {
        let mut inner = self.write();

        if !open() {
            return Err(JobdagError::SchedulerShutdown);
        }

        if inner.jobs.contains_key(record.id()) {
            return Err(JobdagError::DuplicateJob(record.id().clone()));
        }

        if let Some(missing) = record
            .dependencies()
            .iter()
            .find(|dep| !inner.jobs.contains_key(*dep))
        {
            return Err(JobdagError::UnknownDependency {
                job: record.id().clone(),
                dependency: missing.clone(),
            });
        }

        // A cycle needs an existing edge into the new job. With no
        // registered dependents there is none, and the walk is skipped.
        if inner.dependents.contains_key(record.id()) {
            let jobs = &inner.jobs;
            let cycle = find_cycle(record.id(), record.dependencies(), |id| {
                jobs.get(id).map(|job| job.dependencies()).unwrap_or(&[])
            });
            if let Some(cycle) = cycle {
                return Err(JobdagError::CircularDependency { cycle });
            }
        }

        let record = Arc::new(record);
        for dep in record.dependencies() {
            inner
                .dependents
                .entry(dep.clone())
                .or_default()
                .push(record.id().clone());
        }
        inner.jobs.insert(record.id().clone(), Arc::clone(&record));

        debug!(
            job = %record.id(),
            deps = record.dependencies().len(),
            total = inner.jobs.len(),
            "registered job"
        );

        Ok(record)
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobRecord>> {
        self.read().jobs.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().jobs.contains_key(id)
    }

    /// Jobs that list `id` as a dependency.
    pub fn dependents_of(&self, id: &str) -> Vec<Arc<JobRecord>> {
        let inner = self.read();
        inner
            .dependents
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|dep_id| inner.jobs.get(dep_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All jobs in submission order.
    pub fn all(&self) -> Vec<Arc<JobRecord>> {
        let mut jobs: Vec<_> = self.read().jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.seq());
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
