// src/dag/mod.rs

//! Dependency graph bookkeeping.
//!
//! - [`graph`] holds the cycle check run on every submission.
//! - [`registry`] is the concurrent job map (the arena; job IDs are the
//!   indices) plus the reverse adjacency used for propagation.
//! - [`propagator`] decides when Pending jobs become Ready, and cascades
//!   upstream failures under [`FailurePolicy::Cascade`](crate::types::FailurePolicy).

pub mod graph;
pub mod propagator;
pub mod registry;

pub use graph::find_cycle;
pub use propagator::ReadinessPropagator;
pub use registry::JobRegistry;
