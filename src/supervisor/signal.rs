//! Shutdown signal handling for the launcher.
//!
//! A signal source that fails to install never counts as a shutdown
//! request: the failure is logged and that source waits forever.

use std::future::Future;
use std::io;

use tracing::error;

/// Resolve when `signal` fires.
///
/// If `signal` resolves with an error the error is logged under `source`
/// and the returned future never completes.
pub async fn wait_for_signal<F>(source: &'static str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(err) = signal.await {
        error!(source, %err, "signal handler failed, ignoring this source");
        std::future::pending::<()>().await;
    }
}

/// Resolve on ctrl-c, or on SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = wait_for_signal("ctrl-c", tokio::signal::ctrl_c());

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
