// src/job/mod.rs

//! Job records and the pieces they are built from.
//!
//! - [`id`] defines the opaque [`JobId`] handle and the [`JobStatus`] state
//!   machine.
//! - [`signal`] holds the one-shot, multi-waiter [`CompletionSignal`].
//! - [`spec`] is the caller-facing [`JobSpec`] builder used for submission.
//! - [`record`] is the registry entry: immutable identity plus the mutable
//!   status container that every component transitions by compare-and-set.

pub mod id;
pub mod record;
pub mod signal;
pub mod spec;

pub use id::{JobId, JobStatus};
pub use record::{JobRecord, JobSnapshot};
pub use signal::CompletionSignal;
pub use spec::{JobBody, JobFuture, JobSpec};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent before it
/// can panic, so a poisoned lock carries no torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
