//! Unit tests for shutdown signal handling.

use std::io;
use std::time::Duration;

use linecast::supervisor::wait_for_signal;

#[tokio::test]
async fn delivered_signal_resolves() {
    tokio::time::timeout(
        Duration::from_secs(1),
        wait_for_signal("test", async { Ok(()) }),
    )
    .await
    .expect("a delivered signal must resolve");
}

#[tokio::test]
async fn failed_handler_is_not_a_shutdown_request() {
    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        wait_for_signal("test", async {
            Err(io::Error::new(io::ErrorKind::Other, "handler unavailable"))
        }),
    )
    .await;

    assert!(outcome.is_err(), "a broken handler must never trigger shutdown");
}
