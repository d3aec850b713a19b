//! Error types shared across the crate.
//!
//! [`SinkError`] is the vocabulary spoken between a
//! [`LineSink`](crate::sink::LineSink) and whoever writes into it.
//! [`AppError`] covers the launcher surface (config, process spawning, CLI).

use std::fmt::{Display, Formatter};
use std::io;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type returned by [`LineSink`](crate::sink::LineSink) operations.
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// A failure reported by one member of a broadcast, tagged with its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    /// Name of the member sink that failed.
    pub member: String,
    /// The error the member reported.
    pub error: SinkError,
}

impl Display for MemberFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.member, self.error)
    }
}

/// Failure modes of a line sink.
///
/// `ConsumerClosed` and `TransportInterrupted` are closure signals: the sink
/// has ended its life and must not be written to again. Everything else is
/// an ordinary failure that leaves the sink usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The destination has already been shut down.
    ConsumerClosed(String),
    /// The underlying channel was torn down while a write was in flight.
    TransportInterrupted(String),
    /// Any other I/O or delivery failure of a single sink.
    Io(String),
    /// One or more members of a broadcast failed to accept a line.
    Delivery(Vec<MemberFailure>),
    /// One or more members of a broadcast failed to close.
    CloseFailed(Vec<MemberFailure>),
}

impl SinkError {
    /// Whether this error means the sink is permanently closed.
    #[must_use]
    pub fn is_closure_signal(&self) -> bool {
        matches!(self, Self::ConsumerClosed(_) | Self::TransportInterrupted(_))
    }

    /// Member failures carried by an aggregate error, empty otherwise.
    #[must_use]
    pub fn failures(&self) -> &[MemberFailure] {
        match self {
            Self::Delivery(failures) | Self::CloseFailed(failures) => failures,
            _ => &[],
        }
    }
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsumerClosed(msg) => write!(f, "consumer closed: {msg}"),
            Self::TransportInterrupted(msg) => write!(f, "transport interrupted: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Delivery(failures) => {
                write!(f, "delivery failed for {} member(s)", failures.len())?;
                write_failures(f, failures)
            }
            Self::CloseFailed(failures) => {
                write!(f, "close failed for {} member(s)", failures.len())?;
                write_failures(f, failures)
            }
        }
    }
}

fn write_failures(f: &mut Formatter<'_>, failures: &[MemberFailure]) -> std::fmt::Result {
    for (idx, failure) in failures.iter().enumerate() {
        let sep = if idx == 0 { ": " } else { "; " };
        write!(f, "{sep}{failure}")?;
    }
    Ok(())
}

impl std::error::Error for SinkError {}

impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::ConsumerClosed(err.to_string()),
            io::ErrorKind::Interrupted => Self::TransportInterrupted(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Application error enumeration covering the launcher's failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The external process could not be started or supervised.
    Spawn(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// A sink operation failed.
    Sink(SinkError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Sink(err) => write!(f, "sink: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<SinkError> for AppError {
    fn from(err: SinkError) -> Self {
        Self::Sink(err)
    }
}
