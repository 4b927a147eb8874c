//! Thread ownership of the game loop.
//!
//! Exactly one thread drives a [`GameLoop`](crate::core::GameLoop): the first thread that
//! advances a phase (or calls [`establish_owner`](crate::core::GameLoop::establish_owner)).
//! That choice is permanent and recorded as an [`Owner`], which anyone can inspect.
//!
//! [`LoopThread`] is the convenient way to get a dedicated owning thread: it spawns a named
//! thread that runs a runner strategy such as [`looped`](crate::core::runner::looped) over a
//! [`FrameDriver`](crate::core::frame::FrameDriver).

use std::{
    sync::OnceLock,
    thread::{self, JoinHandle, ThreadId},
    time::Instant,
};

use log::debug;

use crate::core::{
    error::ThreadViolation,
    frame::{FrameDriver, StopHandle},
    runner::RunResult,
};

/// The thread that owns a game loop and when it claimed it.
#[derive(Debug, Clone)]
pub struct Owner {
    id: ThreadId,
    name: Option<String>,
    established_at: Instant,
}

impl Owner {
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// The thread's name, if it was given one.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// When the thread became the owner.
    #[inline]
    pub fn established_at(&self) -> Instant {
        self.established_at
    }
}

/// Records and checks which thread owns a loop.
#[derive(Debug, Default)]
pub struct ThreadAffinity {
    owner: OnceLock<Owner>,
}

impl ThreadAffinity {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The owner, once established.
    #[inline]
    pub fn owner(&self) -> Option<&Owner> {
        self.owner.get()
    }

    /// `true` if the calling thread is the established owner.
    pub fn is_owner(&self) -> bool {
        self.owner
            .get()
            .is_some_and(|owner| owner.id == thread::current().id())
    }

    /// Claim the calling thread as owner if nobody has yet.
    ///
    /// Succeeds if the calling thread is (now) the owner.
    pub(crate) fn establish(&self, operation: &'static str) -> Result<&Owner, ThreadViolation> {
        let current = thread::current();
        let owner = self.owner.get_or_init(|| {
            debug!(
                "game loop owned by thread {:?} ({})",
                current.id(),
                current.name().unwrap_or("unnamed")
            );
            Owner {
                id: current.id(),
                name: current.name().map(str::to_owned),
                established_at: Instant::now(),
            }
        });
        if owner.id == current.id() {
            Ok(owner)
        } else {
            Err(self.violation(operation))
        }
    }

    /// Passes on the owning thread, or on any thread while no owner is established.
    ///
    /// Used by registration calls so setup code can run before the first frame.
    pub(crate) fn check(&self, operation: &'static str) -> Result<(), ThreadViolation> {
        match self.owner.get() {
            Some(owner) if owner.id != thread::current().id() => Err(self.violation(operation)),
            _ => Ok(()),
        }
    }

    /// Passes only on the established owning thread.
    pub(crate) fn require(&self, operation: &'static str) -> Result<(), ThreadViolation> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(self.violation(operation))
        }
    }

    fn violation(&self, operation: &'static str) -> ThreadViolation {
        ThreadViolation {
            operation,
            caller: thread::current().id(),
            owner: self.owner.get().map(Owner::id),
        }
    }
}

/// A dedicated thread driving a game loop until it is stopped or quits.
pub struct LoopThread {
    handle: Option<JoinHandle<RunResult>>,
    stop: StopHandle,
}

impl LoopThread {
    /// Name given to the spawned thread.
    pub const THREAD_NAME: &'static str = "game-loop";

    /// Spawn the thread. `runner` is called once with the driver and its result is returned by
    /// [`join`](Self::join).
    pub fn spawn<R>(mut driver: FrameDriver, runner: R) -> std::io::Result<Self>
    where
        R: FnOnce(&mut FrameDriver) -> RunResult + Send + 'static,
    {
        let stop = driver.stop_handle();
        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.to_owned())
            .spawn(move || runner(&mut driver))?;
        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Handle that stops the loop after its current frame.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the loop to stop after its current frame.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// `true` once the runner has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the runner to return.
    pub fn join(mut self) -> RunResult {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_owned());
                RunResult::Panicked(message)
            }),
            None => RunResult::Stopped { frames: 0 },
        }
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.stop();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unestablished_affinity_allows_setup_but_not_owner_checks() {
        let affinity = ThreadAffinity::new();

        assert!(affinity.owner().is_none());
        assert!(!affinity.is_owner());
        assert!(affinity.check("register").is_ok());

        let err = affinity.require("drain").unwrap_err();
        assert_eq!(err.operation, "drain");
        assert_eq!(err.owner, None);
    }

    #[test]
    fn first_establish_wins() {
        let affinity = ThreadAffinity::new();
        let before = Instant::now();

        let owner = affinity.establish("advance").unwrap().clone();
        assert_eq!(owner.id(), thread::current().id());
        assert!(owner.established_at() >= before);
        // Re-establishing from the owner is fine.
        assert!(affinity.establish("advance").is_ok());

        thread::scope(|s| {
            s.spawn(|| {
                let err = affinity.establish("advance").unwrap_err();
                assert_eq!(err.owner, Some(owner.id()));
                assert!(affinity.check("register").is_err());
                assert!(affinity.require("drain").is_err());
                assert!(!affinity.is_owner());
            });
        });

        assert!(affinity.is_owner());
    }

    #[test]
    fn owner_records_thread_name() {
        let affinity = ThreadAffinity::new();

        thread::scope(|s| {
            thread::Builder::new()
                .name("render".into())
                .spawn_scoped(s, || {
                    affinity.establish("advance").unwrap();
                })
                .unwrap();
        });

        assert_eq!(affinity.owner().and_then(Owner::name), Some("render"));
        assert!(!affinity.is_owner());
    }

    #[test]
    fn loop_thread_owns_the_loop_it_drives() {
        use std::sync::Arc;

        use crate::core::{GameLoop, config::Config, runner};

        let game_loop = Arc::new(GameLoop::new());
        let driver = FrameDriver::new(Arc::clone(&game_loop), &Config::default());

        let result = LoopThread::spawn(driver, runner::once).unwrap().join();

        assert!(matches!(result, RunResult::Stopped { frames: 1 }));
        let owner = game_loop.owner().unwrap();
        assert_eq!(owner.name(), Some(LoopThread::THREAD_NAME));
        assert!(game_loop.invoke_required());
    }
}
