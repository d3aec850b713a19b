#![forbid(unsafe_code)]

//! `linecast`: fault-isolating broadcast of line-oriented output.
//!
//! A [`BroadcastLineSink`] fans every line out to a fixed set of
//! [`LineSink`] members (files, consoles, sockets, channels). Members that
//! report closure are excluded without disturbing the rest, concurrent
//! writers and a racing [`LineSink::close`] compose safely, and the
//! [`supervisor`] module feeds the broadcast from an external process's
//! stdout and stderr.

pub mod codec;
pub mod config;
pub mod errors;
pub mod sink;
pub mod supervisor;

pub use config::GlobalConfig;
pub use errors::{AppError, MemberFailure, Result, SinkError, SinkResult};
pub use sink::{BroadcastLineSink, LineSink, MemberState};
