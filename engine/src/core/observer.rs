//! Ordered subscriber lists for loop notifications.
//!
//! Three kinds of notification are raised by a [`GameLoop`]:
//!
//! - **Phase completed**: after a phase's queue has drained and its registry has ticked.
//! - **Before quit**: when a quit is requested. Observers may call
//!   [`GameLoop::cancel_quit`] to abort it.
//! - **Quit**: once, when the host confirms shutdown.
//!
//! Each list is an [`ObserverList`] built on the same [`Roster`] as the update registries, so
//! an observer may unsubscribe itself (or others) while being notified and a subscription made
//! during a notification first fires on the next one.

use std::{fmt, sync::Arc};

use crate::core::{
    GameLoop,
    fault::{self, FaultOrigin, FaultSink},
    phase::Phase,
    quit::QuitState,
    roster::{Key, PassError, Roster},
};

/// Which list a [`Subscription`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PhaseCompleted(Phase),
    BeforeQuit,
    Quit,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::PhaseCompleted(phase) => write!(f, "{phase} completed"),
            Topic::BeforeQuit => f.write_str("before-quit"),
            Topic::Quit => f.write_str("quit"),
        }
    }
}

/// Token returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: Topic,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(topic: Topic, id: u64) -> Self {
        Self { topic, id }
    }

    #[inline]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Raised after a phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEvent {
    pub phase: Phase,
    /// Tick count of the phase's kind at the time it completed.
    pub tick: u64,
}

/// Raised by the quit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitEvent {
    /// The state the loop was in when the notification was raised.
    pub state: QuitState,
    /// Simulation ticks completed so far.
    pub simulation_tick: u64,
}

/// A subscriber callback.
pub type Observer<E> = Arc<dyn Fn(&GameLoop, &E) + Send + Sync>;

pub(crate) struct ObserverList<E> {
    topic: Topic,
    origin: FaultOrigin,
    roster: Roster<Observer<E>>,
}

impl<E: 'static> ObserverList<E> {
    pub(crate) fn new(topic: Topic, origin: FaultOrigin) -> Self {
        Self {
            topic,
            origin,
            roster: Roster::new(),
        }
    }

    pub(crate) fn subscribe<F>(&self, id: u64, observer: F) -> Subscription
    where
        F: Fn(&GameLoop, &E) + Send + Sync + 'static,
    {
        self.roster.insert(Key(id as usize), Arc::new(observer) as Observer<E>);
        Subscription::new(self.topic, id)
    }

    pub(crate) fn unsubscribe(&self, id: u64) -> bool {
        self.roster.remove(Key(id as usize))
    }

    pub(crate) fn len(&self) -> usize {
        self.roster.len()
    }

    /// Notify every observer in subscription order, isolating faults.
    pub(crate) fn notify(
        &self,
        game_loop: &GameLoop,
        event: &E,
        sink: &dyn FaultSink,
    ) -> Result<usize, PassError> {
        self.roster.for_each(|observer| {
            fault::guard(self.origin, sink, || {
                observer(game_loop, event);
                Ok(())
            });
        })
    }
}

impl<E: 'static> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("topic", &self.topic)
            .field("len", &self.len())
            .finish()
    }
}
