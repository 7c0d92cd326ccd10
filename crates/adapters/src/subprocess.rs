// SPDX-License-Identifier: MIT

//! Shared subprocess execution with deadlines.
//!
//! Children run in their own process group so a timeout can terminate the
//! whole tree, not just the immediate child.

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Deadline for git worktree add/remove operations.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);
/// Deadline for short git queries (rev-parse, diff --stat).
pub const GIT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);
/// Deadline for adapter health probes.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from subprocess execution.
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{label} failed to start: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{label} timed out after {seconds}s")]
    Timeout { label: String, seconds: u64 },
    #[error("{label} io error: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

impl SubprocessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SubprocessError::Timeout { .. })
    }
}

/// Run a command to completion with a deadline, capturing output.
///
/// On expiry the child's process group receives SIGKILL and the call
/// returns `SubprocessError::Timeout`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<std::process::Output, SubprocessError> {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd.kill_on_drop(true);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|source| SubprocessError::Spawn { label: label.to_string(), source })?;

    #[cfg(unix)]
    let pid = child.id();

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Io { label: label.to_string(), source }),
        Err(_) => {
            #[cfg(unix)]
            kill_process_group(pid);
            tracing::warn!(label, timeout_s = timeout.as_secs(), "subprocess timed out");
            Err(SubprocessError::Timeout { label: label.to_string(), seconds: timeout.as_secs() })
        }
    }
}

/// SIGKILL the whole process group of a spawned child.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(pid, error = %e, "process group already gone");
    }
}

/// Run a shell command string (`sh -c`) in a working directory.
pub async fn run_shell(
    command: &str,
    cwd: &std::path::Path,
    timeout: Duration,
    label: &str,
) -> Result<std::process::Output, SubprocessError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    run_with_timeout(cmd, timeout, label).await
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
