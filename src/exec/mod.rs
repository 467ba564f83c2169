// src/exec/mod.rs

//! Process-backed job bodies.
//!
//! The scheduler treats job bodies as opaque; this module provides the one
//! concrete body the `jobdag` binary needs: a shell command run through
//! `tokio::process::Command`, with its output forwarded to the log.

pub mod command;

pub use command::{run_shell, shell_job};
