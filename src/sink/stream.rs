//! Line sink over any [`Write`] destination: consoles and sockets.
//!
//! A [`StreamLineSink`] may carry a [`CancellationToken`]. Once the token
//! fires, the sink drops its writer and answers every write with
//! [`SinkError::TransportInterrupted`], including a write that was in
//! flight when the token fired.

use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::LineSink;
use crate::{AppError, Result, SinkError, SinkResult};

/// A line sink writing `line\n` to a byte stream.
pub struct StreamLineSink<W: Write + Send> {
    name: String,
    writer: Mutex<Option<W>>,
    cancel: Option<CancellationToken>,
}

impl<W: Write + Send> StreamLineSink<W> {
    /// Wrap `writer` under the given sink name.
    #[must_use]
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Some(writer)),
            cancel: None,
        }
    }

    /// Tie the sink's lifetime to `cancel`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn interrupted(&self, slot: &mut Option<W>) -> SinkError {
        if slot.take().is_some() {
            debug!(sink = self.name.as_str(), "stream sink cancelled, writer dropped");
        }
        SinkError::TransportInterrupted(format!("{} cancelled", self.name))
    }
}

impl StreamLineSink<io::Stdout> {
    /// Sink writing to the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new("stdout", io::stdout())
    }
}

impl StreamLineSink<io::Stderr> {
    /// Sink writing to the process's standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new("stderr", io::stderr())
    }
}

impl StreamLineSink<TcpStream> {
    /// Connect to a line forwarder listening on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the connection cannot be established.
    pub fn connect_tcp(addr: &str) -> Result<Self> {
        let name = format!("tcp:{addr}");
        let stream = TcpStream::connect(addr)
            .map_err(|e| AppError::Io(format!("failed to connect to {addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| AppError::Io(format!("failed to configure {addr}: {e}")))?;
        Ok(Self::new(name, stream))
    }
}

impl<W: Write + Send> LineSink for StreamLineSink<W> {
    fn write_line(&self, line: &str) -> SinkResult<()> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;

        if self.is_cancelled() {
            return Err(self.interrupted(&mut guard));
        }

        let Some(writer) = guard.as_mut() else {
            return Err(SinkError::ConsumerClosed(format!("{} is closed", self.name)));
        };

        let result = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());

        if self.is_cancelled() {
            return Err(self.interrupted(&mut guard));
        }

        result.map_err(|e| {
            let err = SinkError::from(e);
            if err.is_closure_signal() {
                guard.take();
            }
            err
        })
    }

    fn close(&self) -> SinkResult<()> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;

        match guard.take() {
            Some(mut writer) => writer.flush().map_err(SinkError::from),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
