//! Line sink feeding a bounded tokio channel (UI consoles, live viewers).

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::LineSink;
use crate::{SinkError, SinkResult};

/// Forwards each line into an [`mpsc`] channel without blocking.
///
/// A dropped receiver is a closure signal. A full queue is an ordinary
/// failure: the line is dropped for this sink only and the sink stays
/// active.
pub struct ChannelLineSink {
    name: String,
    sender: Mutex<Option<mpsc::Sender<String>>>,
}

impl ChannelLineSink {
    /// Create a sink and the receiver that consumes its lines.
    ///
    /// `capacity` is clamped to a minimum of 1.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::from_sender(name, tx), rx)
    }

    /// Wrap an existing sender.
    #[must_use]
    pub fn from_sender(name: impl Into<String>, sender: mpsc::Sender<String>) -> Self {
        Self {
            name: name.into(),
            sender: Mutex::new(Some(sender)),
        }
    }
}

impl LineSink for ChannelLineSink {
    fn write_line(&self, line: &str) -> SinkResult<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;

        let Some(sender) = guard.as_ref() else {
            return Err(SinkError::ConsumerClosed(format!("{} is closed", self.name)));
        };

        match sender.try_send(line.to_owned()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(SinkError::Io(format!("{} dropped line: queue full", self.name)))
            }
            Err(TrySendError::Closed(_)) => Err(SinkError::ConsumerClosed(format!(
                "{} receiver dropped",
                self.name
            ))),
        }
    }

    fn close(&self) -> SinkResult<()> {
        let mut guard = self
            .sender
            .lock()
            .map_err(|_| SinkError::Io(format!("{} mutex poisoned", self.name)))?;
        guard.take();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
