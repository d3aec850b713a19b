//! Process output supervision.
//!
//! Launches one external process and relays its stdout and stderr, line by
//! line, into a shared [`LineSink`]. The supervisor speaks no protocol with
//! the child; it only needs something it can write lines into and close.
//!
//! ```text
//!  child stdout ──► relay("stdout") ──┐
//!                                     ├──► sink.write_line()  ──► members
//!  child stderr ──► relay("stderr") ──┘
//!
//!  child exit / cancel ──► drain relays (bounded) ──► sink.close()
//! ```
//!
//! Submodules:
//! - `spawner`: process spawning with environment isolation and piped output.
//! - `relay`: per-stream copy task built on [`LineCodec`](crate::codec::LineCodec).
//! - `signal`: ctrl-c / SIGTERM handling for the launcher.

pub mod relay;
pub mod signal;
pub mod spawner;

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::sink::LineSink;
use crate::{AppError, Result, SinkError};

pub use relay::{relay_lines, RelayStats};
pub use signal::{shutdown_signal, wait_for_signal};
pub use spawner::{spawn_process, LaunchConfig, SpawnedProcess};

/// Outcome of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `None` when terminated by a signal or unknown.
    pub exit_code: Option<i32>,
    /// Human-readable description of how the process ended.
    pub reason: String,
    /// Whether the run ended because of a cancellation request.
    pub cancelled: bool,
    /// Counters for the stdout relay.
    pub stdout: RelayStats,
    /// Counters for the stderr relay.
    pub stderr: RelayStats,
    /// Failure reported when closing the sink, if any.
    pub close_error: Option<SinkError>,
}

impl ExitReport {
    /// Whether the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run the configured process to completion, broadcasting its output.
///
/// Returns once the process has exited, both relays have finished (or been
/// stopped after `shutdown_grace`), and `sink` has been closed.
///
/// On cancellation the child receives SIGTERM (a kill on non-unix
/// platforms) and is killed if it is still running after
/// `config.shutdown_grace`.
///
/// # Errors
///
/// Returns [`AppError::Spawn`] if the process cannot be started or waited
/// on. In that case `sink` is closed before returning.
pub async fn supervise(
    config: &LaunchConfig,
    sink: Arc<dyn LineSink>,
    cancel: CancellationToken,
) -> Result<ExitReport> {
    let span = info_span!("supervise", program = config.program.as_str());

    async move {
        let SpawnedProcess {
            mut child,
            stdout,
            stderr,
        } = match spawn_process(config) {
            Ok(process) => process,
            Err(err) => {
                close_sink(&sink).await;
                return Err(err);
            }
        };

        let relay_cancel = CancellationToken::new();
        let stdout_relay = spawn_relay("stdout", stdout, &sink, config, &relay_cancel);
        let stderr_relay = spawn_relay("stderr", stderr, &sink, config, &relay_cancel);

        let waited = wait_or_terminate(&mut child, config.shutdown_grace, &cancel).await;

        let relays = join(stdout_relay, stderr_relay);
        tokio::pin!(relays);
        let (out_result, err_result) =
            match tokio::time::timeout(config.shutdown_grace, &mut relays).await {
                Ok(results) => results,
                Err(_elapsed) => {
                    warn!("output still open after process exit, stopping relays");
                    relay_cancel.cancel();
                    relays.await
                }
            };
        let stdout_stats = out_result.unwrap_or_else(|err| {
            warn!(%err, "stdout relay task failed");
            RelayStats::default()
        });
        let stderr_stats = err_result.unwrap_or_else(|err| {
            warn!(%err, "stderr relay task failed");
            RelayStats::default()
        });

        let close_error = close_sink(&sink).await;

        let (status, cancelled) = match waited {
            Ok(outcome) => outcome,
            Err(err) => return Err(AppError::Spawn(format!("failed to wait for process: {err}"))),
        };
        let exit_code = status.code();
        let reason = describe_exit(status, cancelled);

        info!(
            exit_code = ?exit_code,
            reason = reason.as_str(),
            stdout_lines = stdout_stats.lines,
            stderr_lines = stderr_stats.lines,
            "supervised process finished"
        );

        Ok(ExitReport {
            exit_code,
            reason,
            cancelled,
            stdout: stdout_stats,
            stderr: stderr_stats,
            close_error,
        })
    }
    .instrument(span)
    .await
}

fn spawn_relay<R>(
    stream: &'static str,
    reader: R,
    sink: &Arc<dyn LineSink>,
    config: &LaunchConfig,
    cancel: &CancellationToken,
) -> JoinHandle<RelayStats>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        relay_lines(
            stream,
            reader,
            Arc::clone(sink),
            config.max_line_bytes,
            cancel.clone(),
        )
        .in_current_span(),
    )
}

/// Wait for the child, or terminate it when `cancel` fires.
///
/// Returns the exit status and whether termination was requested.
async fn wait_or_terminate(
    child: &mut Child,
    grace: Duration,
    cancel: &CancellationToken,
) -> std::io::Result<(ExitStatus, bool)> {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        () = cancel.cancelled() => None,
    };
    if let Some(status) = exited {
        return status.map(|s| (s, false));
    }

    info!("cancellation received, terminating process");
    spawner::request_termination(child);

    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status.map(|s| (s, true));
    }

    warn!(?grace, "process ignored termination request, killing");
    child.kill().await?;
    child.wait().await.map(|s| (s, true))
}

/// Close `sink` on the blocking pool; closing flushes files and sockets.
async fn close_sink(sink: &Arc<dyn LineSink>) -> Option<SinkError> {
    let closing = Arc::clone(sink);
    let result = match tokio::task::spawn_blocking(move || closing.close()).await {
        Ok(result) => result,
        Err(err) => Err(SinkError::Io(format!("close task failed: {err}"))),
    };
    match result {
        Ok(()) => None,
        Err(err) => {
            warn!(sink = sink.name(), error = %err, "failed to close output sink");
            Some(err)
        }
    }
}

fn describe_exit(status: ExitStatus, cancelled: bool) -> String {
    let base = status.code().map_or_else(
        || "process terminated by signal".to_owned(),
        |c| format!("process exited with code {c}"),
    );
    if cancelled {
        format!("{base} after cancellation")
    } else {
        base
    }
}
