//! Relay task: copies lines from one output stream into a sink.
//!
//! Driven by a [`FramedRead`] over [`LineCodec`], so over-long lines are
//! rejected before they are buffered in full.
//!
//! | Stream event        | Effect                                          |
//! |---------------------|-------------------------------------------------|
//! | line                | `sink.write_line(line)` on the blocking pool    |
//! | line too long       | skipped; logged at `WARN`                       |
//! | sink failure        | counted; logged at `WARN`; relay continues      |
//! | cancel during write | relay stops; the write finishes in the pool     |
//! | I/O error           | relay stops                                     |
//! | EOF / cancellation  | relay stops                                     |

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{LineCodec, LineCodecError};
use crate::sink::LineSink;

/// Counters for one relayed stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Lines read from the stream and handed to the sink.
    pub lines: u64,
    /// Lines the sink reported a delivery failure for.
    pub failed: u64,
    /// Lines discarded for exceeding the length limit.
    pub skipped: u64,
}

/// Copy every line of `reader` into `sink` until EOF or cancellation.
///
/// Each write runs on the blocking pool, one line at a time, so a stalled
/// sink never holds a runtime thread and cancellation stays responsive.
///
/// `stream` labels the source in logs (`"stdout"`, `"stderr"`). The sink is
/// not closed here: several relays usually share one sink, and closing is
/// the supervisor's job once all of them finish.
pub async fn relay_lines<R>(
    stream: &'static str,
    reader: R,
    sink: Arc<dyn LineSink>,
    max_line_bytes: usize,
    cancel: CancellationToken,
) -> RelayStats
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(reader, LineCodec::with_max_length(max_line_bytes));
    let mut stats = RelayStats::default();
    // FramedRead yields a single `None` after a decode error before resuming.
    let mut resuming = false;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(stream, "relay: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None if resuming => {
                        resuming = false;
                    }

                    None => {
                        debug!(stream, lines = stats.lines, "relay: EOF detected");
                        break;
                    }

                    Some(Err(LineCodecError::TooLong(max))) => {
                        stats.skipped += 1;
                        resuming = true;
                        warn!(stream, max, "relay: line exceeds limit, skipping");
                    }

                    Some(Err(LineCodecError::Io(err))) => {
                        warn!(stream, error = %err, "relay: IO error, stopping");
                        break;
                    }

                    Some(Ok(line)) => {
                        resuming = false;
                        stats.lines += 1;

                        // Sink writes are blocking I/O; keep them off the runtime threads.
                        let writer = Arc::clone(&sink);
                        let write = tokio::task::spawn_blocking(move || writer.write_line(&line));

                        tokio::select! {
                            biased;

                            () = cancel.cancelled() => {
                                debug!(stream, "relay: cancelled during sink write, stopping");
                                break;
                            }

                            joined = write => match joined {
                                Ok(Ok(())) => {}
                                Ok(Err(err)) => {
                                    stats.failed += 1;
                                    warn!(
                                        stream,
                                        sink = sink.name(),
                                        error = %err,
                                        "relay: sink rejected line"
                                    );
                                }
                                Err(err) => {
                                    stats.failed += 1;
                                    warn!(stream, %err, "relay: sink write task failed");
                                }
                            },
                        }
                    }
                }
            }
        }
    }

    stats
}
