// src/exec/command.rs

//! Shell command job bodies.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::job::JobSpec;

/// Build a [`JobSpec`] whose body runs `cmd` through the platform shell.
///
/// The returned spec has no ID, priority or dependencies; set them with
/// the builder methods.
pub fn shell_job(name: &str, cmd: &str) -> JobSpec {
    let name = name.to_string();
    let cmd = cmd.to_string();
    JobSpec::new(move || run_shell(name, cmd))
}

/// Run a shell command to completion.
///
/// stdout lines are logged at `info`, stderr lines at `debug`. A non-zero
/// exit status is an error. The child is killed if this future is dropped,
/// which is what happens when a forced shutdown aborts the job.
pub async fn run_shell(name: String, cmd: String) -> Result<()> {
    info!(job = %name, cmd = %cmd, "starting process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for job '{name}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let job = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(job = %job, "stdout: {}", line);
            }
        });
    }

    // Always consume stderr so the pipe buffer never fills.
    if let Some(stderr) = child.stderr.take() {
        let job = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = %job, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of job '{name}'"))?;

    let code = status.code().unwrap_or(-1);
    info!(job = %name, exit_code = code, success = status.success(), "process exited");

    if !status.success() {
        bail!("command `{cmd}` exited with code {code}");
    }

    Ok(())
}
