//! Line sinks: destinations that accept discrete lines of text.
//!
//! Provides the [`LineSink`] trait and the destinations shipped with the
//! crate. [`BroadcastLineSink`] composes any number of them and is itself a
//! [`LineSink`], so broadcasts nest.

pub mod broadcast;
pub mod channel;
pub mod file;
pub mod stream;

use std::sync::Arc;

use crate::SinkResult;

/// A destination that accepts lines of text and can be closed.
///
/// Implementations must be [`Send`] and [`Sync`]: a single sink may be
/// written to from several producer threads at once. Each call carries one
/// complete line without its terminator; the sink owns terminator
/// conventions.
///
/// A sink that has ended its life reports it through
/// [`SinkError::ConsumerClosed`](crate::SinkError::ConsumerClosed) or
/// [`SinkError::TransportInterrupted`](crate::SinkError::TransportInterrupted).
pub trait LineSink: Send + Sync {
    /// Write a single line.
    ///
    /// # Errors
    ///
    /// Returns a closure signal if the sink is closed, or
    /// [`SinkError::Io`](crate::SinkError::Io) for any other failure.
    fn write_line(&self, line: &str) -> SinkResult<()>;

    /// Close the sink, releasing its underlying resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource fails to flush or close.
    fn close(&self) -> SinkResult<()>;

    /// Name used in logs and in [`MemberFailure`](crate::MemberFailure)
    /// reports.
    ///
    /// Defaults to the full type path (for example
    /// `my_crate::sinks::Viewer`). Sinks that can exist more than once in a
    /// broadcast should override it with something that tells instances
    /// apart; every sink in this crate does.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T: LineSink + ?Sized> LineSink for Box<T> {
    fn write_line(&self, line: &str) -> SinkResult<()> {
        (**self).write_line(line)
    }

    fn close(&self) -> SinkResult<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: LineSink + ?Sized> LineSink for Arc<T> {
    fn write_line(&self, line: &str) -> SinkResult<()> {
        (**self).write_line(line)
    }

    fn close(&self) -> SinkResult<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub use broadcast::{BroadcastLineSink, MemberState};
pub use channel::ChannelLineSink;
pub use file::{FileLineSink, LineFormat};
pub use stream::StreamLineSink;
