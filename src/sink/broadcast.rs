//! Fault-isolating broadcast over a fixed set of line sinks.
//!
//! [`BroadcastLineSink`] forwards every line to each member that is still
//! active. A member that answers with a closure signal is excluded for good;
//! the other members still receive the line.
//!
//! # Concurrency
//!
//! The member list never changes after construction. Each member slot holds
//! an atomic state that moves `Active → ClosedBySelf` or
//! `Active → ClosedByAggregate` exactly once via compare-and-swap.
//!
//! The aggregate closed flag sits behind a [`RwLock`]. Writers hold the
//! shared side for the whole fan-out, [`LineSink::close`] takes the
//! exclusive side. A close therefore lands entirely before or entirely after
//! any in-flight write, and no member is written to after the aggregate
//! closed it.
//!
//! ```text
//!   write_line(line)            close()
//!        │ read lock               │ write lock (waits for writers)
//!        ├──► member 0 (active) ──►│ closed = true
//!        ├──► member 1 (closed)    ├──► close member 0
//!        └──► member 2 (active)    └──► close member 2
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, warn};

use super::LineSink;
use crate::{MemberFailure, SinkError, SinkResult};

const ACTIVE: u8 = 0;
const CLOSED_BY_SELF: u8 = 1;
const CLOSED_BY_AGGREGATE: u8 = 2;

/// Liveness of a single broadcast member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    /// Eligible for future writes.
    Active,
    /// The member reported a closure signal during a write.
    ClosedBySelf,
    /// The member was closed by [`LineSink::close`].
    ClosedByAggregate,
}

impl MemberState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ACTIVE => Self::Active,
            CLOSED_BY_SELF => Self::ClosedBySelf,
            _ => Self::ClosedByAggregate,
        }
    }
}

struct Member {
    sink: Box<dyn LineSink>,
    state: AtomicU8,
}

impl Member {
    fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }

    /// Move from `Active` to `next`; `true` only for the caller that won.
    fn retire(&self, next: u8) -> bool {
        self.state
            .compare_exchange(ACTIVE, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A line sink that fans each line out to every active member.
///
/// Members are owned exclusively by the broadcast. Construction order is
/// preserved by [`Self::member_states`].
pub struct BroadcastLineSink {
    name: String,
    members: Vec<Member>,
    closed: RwLock<bool>,
}

impl BroadcastLineSink {
    /// Construct a broadcast over `members`, all initially active.
    #[must_use]
    pub fn new(members: Vec<Box<dyn LineSink>>) -> Self {
        let members = members
            .into_iter()
            .map(|sink| Member {
                sink,
                state: AtomicU8::new(ACTIVE),
            })
            .collect();
        Self {
            name: "broadcast".to_owned(),
            members,
            closed: RwLock::new(false),
        }
    }

    /// Set the name reported in logs and by [`LineSink::name`].
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of members, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the broadcast was built without members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members still eligible for writes.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_active()).count()
    }

    /// True once [`LineSink::close`] ran or every member has closed itself.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let closed = *self.closed.read().unwrap_or_else(PoisonError::into_inner);
        closed || self.active_count() == 0
    }

    /// Member names and states in construction order.
    #[must_use]
    pub fn member_states(&self) -> Vec<(String, MemberState)> {
        self.members
            .iter()
            .map(|m| {
                (
                    m.sink.name().to_owned(),
                    MemberState::from_raw(m.state.load(Ordering::Acquire)),
                )
            })
            .collect()
    }
}

impl fmt::Debug for BroadcastLineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let closed = *self.closed.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("BroadcastLineSink")
            .field("name", &self.name)
            .field("members", &self.member_states())
            .field("closed", &closed)
            .finish()
    }
}

impl FromIterator<Box<dyn LineSink>> for BroadcastLineSink {
    fn from_iter<I: IntoIterator<Item = Box<dyn LineSink>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl LineSink for BroadcastLineSink {
    /// Deliver `line` to every active member.
    ///
    /// Closure signals from members are absorbed and retire the member.
    /// Writing to a closed broadcast succeeds without touching any member.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Delivery`] listing every member that failed with
    /// an error other than a closure signal. Those members stay active and
    /// every other member still received the line.
    fn write_line(&self, line: &str) -> SinkResult<()> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Ok(());
        }

        let mut failures = Vec::new();
        for member in &self.members {
            if !member.is_active() {
                continue;
            }
            match member.sink.write_line(line) {
                Ok(()) => {}
                Err(err) if err.is_closure_signal() => {
                    if member.retire(CLOSED_BY_SELF) {
                        debug!(
                            broadcast = self.name.as_str(),
                            sink = member.sink.name(),
                            reason = %err,
                            "member closed itself, excluding from broadcast"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        broadcast = self.name.as_str(),
                        sink = member.sink.name(),
                        error = %err,
                        "member failed to accept line"
                    );
                    failures.push(MemberFailure {
                        member: member.sink.name().to_owned(),
                        error: err,
                    });
                }
            }
        }
        drop(closed);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Delivery(failures))
        }
    }

    /// Close the broadcast and every member that is still active.
    ///
    /// Only the first call does any work. Members that already closed
    /// themselves are not closed again.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::CloseFailed`] listing every member whose own
    /// `close` failed. All members are attempted regardless.
    fn close(&self) -> SinkResult<()> {
        let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Ok(());
        }
        *closed = true;

        let mut attempted = 0_usize;
        let mut failures = Vec::new();
        for member in &self.members {
            if !member.retire(CLOSED_BY_AGGREGATE) {
                continue;
            }
            attempted += 1;
            if let Err(err) = member.sink.close() {
                warn!(
                    broadcast = self.name.as_str(),
                    sink = member.sink.name(),
                    error = %err,
                    "member failed to close"
                );
                failures.push(MemberFailure {
                    member: member.sink.name().to_owned(),
                    error: err,
                });
            }
        }
        drop(closed);

        info!(
            broadcast = self.name.as_str(),
            closed = attempted,
            failed = failures.len(),
            "broadcast closed"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError::CloseFailed(failures))
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
