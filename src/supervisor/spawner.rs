//! External process spawner.
//!
//! Spawns the supervised process with:
//! - `kill_on_drop(true)` so the child never outlives its handle.
//! - `env_clear()` + an allowlist so only the listed variables leak into
//!   the child's environment.
//! - piped stdout/stderr and a null stdin: the child is a pure producer
//!   of lines.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{info, info_span, warn};

use crate::{AppError, Result};

/// Configuration for spawning the supervised process.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Program to launch.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; `None` inherits the current directory.
    pub working_dir: Option<PathBuf>,
    /// Variables copied from this process's environment.
    pub env_allowlist: Vec<String>,
    /// Variables set explicitly on the child, after the allowlist.
    pub extra_env: Vec<(String, String)>,
    /// Maximum accepted line length on stdout and stderr.
    pub max_line_bytes: usize,
    /// Time the child gets to exit after a termination request.
    pub shutdown_grace: Duration,
}

/// A running child with its output pipes detached.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// Child process handle; dropping it kills the process.
    pub child: Child,
    /// The child's standard output.
    pub stdout: ChildStdout,
    /// The child's standard error.
    pub stderr: ChildStderr,
}

/// Spawn the configured process with piped output streams.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn …")`: OS spawn failure.
/// - `AppError::Spawn("failed to capture …")`: a pipe was not created.
pub fn spawn_process(config: &LaunchConfig) -> Result<SpawnedProcess> {
    let span = info_span!("spawn_process", program = config.program.as_str());
    let _guard = span.enter();

    let mut cmd = Command::new(&config.program);
    cmd.args(&config.args);

    // Strip inherited environment, then inject only the allowlist.
    cmd.env_clear();
    for key in &config.env_allowlist {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }
    for (key, val) in &config.extra_env {
        cmd.env(key, val);
    }

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        warn!(%err, "process spawn failed");
        AppError::Spawn(format!("failed to spawn {}: {err}", config.program))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture child stderr".into()))?;

    info!(
        pid = child.id().unwrap_or(0),
        args = ?config.args,
        "process spawned"
    );

    Ok(SpawnedProcess {
        child,
        stdout,
        stderr,
    })
}

/// Ask the child to exit: SIGTERM on unix, a hard kill elsewhere.
pub(crate) fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
            // Already reaped.
            return;
        };
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            warn!(pid, %err, "failed to send SIGTERM, killing instead");
            child.start_kill().ok();
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = child.start_kill() {
            warn!(%err, "failed to kill child process");
        }
    }
}
