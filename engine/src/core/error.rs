//! Error types surfaced by the game loop.
//!
//! Faults raised by user callbacks are *not* errors here: they are caught and routed to the
//! [`FaultSink`](crate::core::fault::FaultSink). The types in this module are the hard failures
//! that terminate the offending call path.

use std::thread::ThreadId;

use thiserror::Error;

use crate::core::phase::Phase;

/// The main error type for game loop operations.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    ThreadViolation(#[from] ThreadViolation),

    #[error(transparent)]
    RegistryCorruption(#[from] RegistryCorruption),

    #[error("phase {0} advanced while another phase is still running")]
    ReentrantAdvance(Phase),

    #[error("invoke queue of {0} drained from inside one of its own jobs")]
    ReentrantDrain(Phase),

    #[error("{0} observers notified while already notifying")]
    ReentrantNotify(&'static str),

    #[error("unknown phase name: {0}")]
    UnknownPhase(String),

    #[error("phase {0} has no invoke queue")]
    NoInvokeQueue(Phase),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Config(#[from] toml::de::Error),
}

/// An owning-thread-only operation was called from another thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} requires the owning thread (caller {caller:?}, owner {owner:?})")]
pub struct ThreadViolation {
    /// The rejected operation.
    pub operation: &'static str,
    /// The thread that attempted it.
    pub caller: ThreadId,
    /// The owning thread, `None` if no thread has claimed the loop yet.
    pub owner: Option<ThreadId>,
}

/// The bookkeeping that runs after an iteration pass found inconsistent state.
///
/// Continuing after this would silently drop or duplicate registrations, so it is
/// propagated out of the phase advance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryCorruption {
    #[error("tombstone at index {index} is out of range for {len} live entries")]
    TombstoneOutOfRange { index: usize, len: usize },

    #[error("pending entry {key:#x} is already live")]
    DuplicateEntry { key: usize },
}
