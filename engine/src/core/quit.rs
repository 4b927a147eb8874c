//! Application quit protocol.
//!
//! ```text
//!            request_quit             notify_shutdown
//!   None ─────────────────► BeforeQuit ───────────────► Quit
//!    ▲                          │
//!    └──────── cancel_quit ─────┘
//! ```
//!
//! `Quit` is terminal. Transitions attempted from the wrong state are silent no-ops.
//! The state lives in a single atomic so it can be read from any thread.

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// Where the loop is in the quit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QuitState {
    /// Running normally.
    None = 0,
    /// A quit was requested and termination is in progress.
    BeforeQuit = 1,
    /// The host confirmed shutdown.
    Quit = 2,
}

impl QuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => QuitState::None,
            1 => QuitState::BeforeQuit,
            _ => QuitState::Quit,
        }
    }
}

impl fmt::Display for QuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuitState::None => "none",
            QuitState::BeforeQuit => "before-quit",
            QuitState::Quit => "quit",
        })
    }
}

/// Result of [`GameLoop::request_quit`](crate::core::GameLoop::request_quit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOutcome {
    /// The loop was not in [`QuitState::None`], nothing happened.
    Ignored,
    /// A before-quit observer cancelled the request.
    Cancelled,
    /// The terminate capability was invoked.
    Terminating,
}

/// The host-specific way of actually shutting down.
///
/// Invoked once a quit request survives the before-quit notification. The host later confirms
/// with [`GameLoop::notify_shutdown`](crate::core::GameLoop::notify_shutdown).
pub trait Terminate: Send + Sync {
    fn terminate(&self);
}

impl<F> Terminate for F
where
    F: Fn() + Send + Sync,
{
    fn terminate(&self) {
        self()
    }
}

/// Terminator that does nothing. The host is expected to poll
/// [`GameLoop::quit_state`](crate::core::GameLoop::quit_state) instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTerminate;

impl Terminate for NoopTerminate {
    fn terminate(&self) {}
}

pub(crate) struct QuitMachine {
    state: AtomicU8,
}

impl QuitMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(QuitState::None as u8),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> QuitState {
        QuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `None -> BeforeQuit`. Returns `false` from any other state.
    pub(crate) fn begin_request(&self) -> bool {
        self.transition(QuitState::None, QuitState::BeforeQuit)
    }

    /// `BeforeQuit -> None`. Returns `false` from any other state.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(QuitState::BeforeQuit, QuitState::None)
    }

    /// Any state `-> Quit`. Returns `false` if already terminal.
    pub(crate) fn finish(&self) -> bool {
        self.state.swap(QuitState::Quit as u8, Ordering::AcqRel) != QuitState::Quit as u8
    }

    fn transition(&self, from: QuitState, to: QuitState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for QuitMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QuitMachine").field(&self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_then_cancel_returns_to_none() {
        let machine = QuitMachine::new();

        assert!(machine.begin_request());
        assert_eq!(machine.state(), QuitState::BeforeQuit);
        assert!(!machine.begin_request());
        assert!(machine.cancel());
        assert_eq!(machine.state(), QuitState::None);
        assert!(!machine.cancel());
    }

    #[test]
    fn quit_is_terminal() {
        let machine = QuitMachine::new();

        assert!(machine.begin_request());
        assert!(machine.finish());
        assert!(!machine.finish());
        assert!(!machine.cancel());
        assert!(!machine.begin_request());
        assert_eq!(machine.state(), QuitState::Quit);
    }

    #[test]
    fn closures_terminate() {
        let fired = std::sync::atomic::AtomicBool::new(false);
        let terminate = || fired.store(true, Ordering::SeqCst);

        Terminate::terminate(&terminate);

        assert!(fired.load(Ordering::SeqCst));
    }
}
