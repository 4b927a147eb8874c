//! The single reporting channel for faults raised by callbacks.
//!
//! Updatables, queued jobs and observers are independent collaborators: one of them failing
//! must not starve the others. Every callback invocation goes through [`guard`], which catches
//! both returned errors and panics and hands them to the loop's [`FaultSink`] as an
//! [`EntryFault`].
//!
//! # Sinks
//!
//! - [`LogSink`]: the default, writes each fault through the `log` facade at `error` level.
//! - [`RecordingSink`]: keeps faults in memory so tests can assert on them.
//! - [`ChannelSink`]: forwards faults over a crossbeam channel to a front end.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use crossbeam::channel::{Receiver, Sender, unbounded};
use log::error;
use parking_lot::Mutex;

use crate::core::phase::Phase;

/// Where a fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOrigin {
    /// An updatable ticked during the phase.
    Updatable(Phase),
    /// A job drained from the phase's invoke queue.
    Invoke(Phase),
    /// A phase-completed observer.
    PhaseObserver(Phase),
    /// A before-quit observer.
    BeforeQuitObserver,
    /// A quit observer.
    QuitObserver,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultOrigin::Updatable(phase) => write!(f, "updatable in {phase}"),
            FaultOrigin::Invoke(phase) => write!(f, "invoke job in {phase}"),
            FaultOrigin::PhaseObserver(phase) => write!(f, "{phase} observer"),
            FaultOrigin::BeforeQuitObserver => f.write_str("before-quit observer"),
            FaultOrigin::QuitObserver => f.write_str("quit observer"),
        }
    }
}

/// A fault raised by a single callback during its own execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFault {
    origin: FaultOrigin,
    message: String,
}

impl EntryFault {
    /// Construct a fault for the given origin.
    pub fn new(origin: FaultOrigin, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
        }
    }

    /// Where the fault was raised.
    #[inline]
    pub fn origin(&self) -> FaultOrigin {
        self.origin
    }

    /// The error message or panic payload.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EntryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} faulted: {}", self.origin, self.message)
    }
}

/// Receiver of every [`EntryFault`] raised by a game loop.
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: EntryFault);
}

/// Default sink, writes faults to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FaultSink for LogSink {
    fn report(&self, fault: EntryFault) {
        error!(target: "rusty_loop::fault", "{fault}");
    }
}

/// Sink that records faults in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    faults: Mutex<Vec<EntryFault>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every fault reported so far.
    pub fn faults(&self) -> Vec<EntryFault> {
        self.faults.lock().clone()
    }

    /// Number of faults reported so far.
    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }

    /// Remove and return the recorded faults.
    pub fn take(&self) -> Vec<EntryFault> {
        std::mem::take(&mut *self.faults.lock())
    }
}

impl FaultSink for RecordingSink {
    fn report(&self, fault: EntryFault) {
        self.faults.lock().push(fault);
    }
}

/// Sink that forwards faults over a channel, for front ends running on another thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<EntryFault>,
}

impl ChannelSink {
    pub fn new(sender: Sender<EntryFault>) -> Self {
        Self { sender }
    }

    pub fn with_receiver() -> (Self, Receiver<EntryFault>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }
}

impl FaultSink for ChannelSink {
    fn report(&self, fault: EntryFault) {
        // The front end may already be gone during shutdown; fall back to the log.
        if let Err(err) = self.sender.try_send(fault) {
            LogSink.report(err.into_inner());
        }
    }
}

/// Run one callback, reporting a returned error or a panic to `sink`.
///
/// Returns `true` if the callback completed without a fault.
pub(crate) fn guard<F>(origin: FaultOrigin, sink: &dyn FaultSink, callback: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            sink.report(EntryFault::new(origin, format!("{err:#}")));
            false
        }
        Err(payload) => {
            sink.report(EntryFault::new(origin, panic_message(payload.as_ref())));
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked with a non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_passes_through_success() {
        let sink = RecordingSink::new();

        assert!(guard(FaultOrigin::Updatable(Phase::Update), &sink, || Ok(())));
        assert!(sink.is_empty());
    }

    #[test]
    fn guard_reports_returned_errors() {
        let sink = RecordingSink::new();

        let ok = guard(FaultOrigin::Invoke(Phase::LateUpdate), &sink, || {
            anyhow::bail!("disk full")
        });

        assert!(!ok);
        let faults = sink.take();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].origin(), FaultOrigin::Invoke(Phase::LateUpdate));
        assert_eq!(faults[0].message(), "disk full");
        assert!(sink.is_empty());
    }

    #[test]
    fn guard_catches_panics() {
        let sink = RecordingSink::new();

        let ok = guard(FaultOrigin::QuitObserver, &sink, || panic!("boom {}", 7));

        assert!(!ok);
        assert_eq!(sink.faults()[0].message(), "panicked: boom 7");
        assert_eq!(
            sink.faults()[0].to_string(),
            "quit observer faulted: panicked: boom 7"
        );
    }

    #[test]
    fn channel_sink_forwards_faults() {
        let (sink, receiver) = ChannelSink::with_receiver();

        sink.report(EntryFault::new(
            FaultOrigin::PhaseObserver(Phase::TardyUpdate),
            "late",
        ));

        let fault = receiver.try_recv().unwrap();
        assert_eq!(fault.origin(), FaultOrigin::PhaseObserver(Phase::TardyUpdate));
    }
}
