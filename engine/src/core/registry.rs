//! Per-phase registries of periodic callbacks.
//!
//! An [`UpdateRegistry`] holds the [`Updatable`]s ticked during one phase. Registration is by
//! handle identity: the same `Arc` registered twice is ticked once per pass.
//!
//! The registry is safe to mutate from inside a tick (see [`Roster`] for the exact rules):
//! an updatable registered mid-tick first runs on the next tick, and an updatable removed
//! mid-tick is skipped if it has not run yet.

use std::sync::Arc;

use crate::core::{
    context::Context,
    error::LoopError,
    fault::{self, FaultOrigin, FaultSink},
    phase::Phase,
    roster::{Key, Roster},
};

/// A callback ticked once per advance of the phase it is registered with.
///
/// Returning an error (or panicking) is reported through the loop's fault sink and does not
/// stop the other updatables of the phase.
pub trait Updatable: Send + Sync {
    fn tick(&self, ctx: &Context<'_>) -> anyhow::Result<()>;
}

impl<F> Updatable for F
where
    F: Fn(&Context<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn tick(&self, ctx: &Context<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Wrap a closure as a registrable updatable handle.
///
/// ```rust,ignore
/// let counter = from_fn(|ctx| {
///     log::info!("{} tick {}", ctx.phase(), ctx.tick());
///     Ok(())
/// });
/// game_loop.register(Phase::Update, &counter)?;
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn Updatable>
where
    F: Fn(&Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn key_of(handle: &Arc<dyn Updatable>) -> Key {
    Key(Arc::as_ptr(handle).cast::<()>() as usize)
}

/// The updatables of one phase.
pub struct UpdateRegistry {
    phase: Phase,
    roster: Roster<Arc<dyn Updatable>>,
    sink: Arc<dyn FaultSink>,
}

impl UpdateRegistry {
    pub(crate) fn new(phase: Phase, sink: Arc<dyn FaultSink>) -> Self {
        Self {
            phase,
            roster: Roster::new(),
            sink,
        }
    }

    /// The phase this registry belongs to.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Register a handle. Returns `false` if it was already registered (or pending).
    pub(crate) fn add(&self, handle: &Arc<dyn Updatable>) -> bool {
        self.roster.insert(key_of(handle), Arc::clone(handle))
    }

    /// Unregister a handle. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, handle: &Arc<dyn Updatable>) -> bool {
        self.roster.remove(key_of(handle))
    }

    /// `true` if the handle is live. Handles added during the current tick are not yet live.
    pub fn contains(&self, handle: &Arc<dyn Updatable>) -> bool {
        self.roster.contains(key_of(handle))
    }

    /// Number of live updatables.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of updatables registered during the current tick, waiting to join.
    pub fn pending_len(&self) -> usize {
        self.roster.pending_len()
    }

    /// Tick every live updatable in registration order. Returns how many were ticked.
    pub(crate) fn tick(&self, ctx: &Context<'_>) -> Result<usize, LoopError> {
        let origin = FaultOrigin::Updatable(self.phase);
        self.roster
            .for_each(|updatable| {
                fault::guard(origin, &*self.sink, || updatable.tick(ctx));
            })
            .map_err(|err| err.into_loop_error(|| LoopError::ReentrantAdvance(self.phase)))
    }

    /// Queue a handle for the next settle without membership checks.
    #[cfg(test)]
    pub(crate) fn push_pending_unchecked(&self, handle: &Arc<dyn Updatable>) {
        self.roster
            .push_pending_unchecked(key_of(handle), Arc::clone(handle));
    }
}

impl std::fmt::Debug for UpdateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRegistry")
            .field("phase", &self.phase)
            .field("len", &self.len())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::core::{GameLoop, fault::RecordingSink};

    fn counter() -> (Arc<AtomicU32>, Arc<dyn Updatable>) {
        let count = Arc::new(AtomicU32::new(0));
        let handle = {
            let count = Arc::clone(&count);
            from_fn(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        (count, handle)
    }

    fn registry() -> (UpdateRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (UpdateRegistry::new(Phase::Update, sink.clone()), sink)
    }

    #[test]
    fn double_registration_ticks_once() {
        let game_loop = GameLoop::new();
        let (registry, _) = registry();
        let (count, handle) = counter();

        assert!(registry.add(&handle));
        assert!(!registry.add(&handle));
        registry.tick(&Context::new(&game_loop, Phase::Update, 1)).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_handles_to_equal_closures_are_distinct_entries() {
        let (registry, _) = registry();
        let a = from_fn(|_| Ok(()));
        let b = from_fn(|_| Ok(()));

        assert!(registry.add(&a));
        assert!(registry.add(&b));
        assert_eq!(registry.len(), 2);
        assert!(registry.remove(&a));
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
    }

    #[test]
    fn fault_isolated_and_reported_once() {
        let game_loop = GameLoop::new();
        let (registry, sink) = registry();
        let order = Arc::new(Mutex::new(Vec::new()));

        let entries: Vec<Arc<dyn Updatable>> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                from_fn(move |_| {
                    order.lock().push(i);
                    if i == 1 {
                        anyhow::bail!("entry {i} failed");
                    }
                    Ok(())
                })
            })
            .collect();
        for entry in &entries {
            registry.add(entry);
        }

        let ticked = registry
            .tick(&Context::new(&game_loop, Phase::Update, 1))
            .unwrap();

        assert_eq!(ticked, 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        let faults = sink.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].origin(), FaultOrigin::Updatable(Phase::Update));
        assert_eq!(faults[0].message(), "entry 1 failed");
    }

    #[test]
    fn panicking_entry_does_not_stop_pass() {
        let game_loop = GameLoop::new();
        let (registry, sink) = registry();
        let (count, after) = counter();
        let panics = from_fn(|_| panic!("tick exploded"));

        registry.add(&panics);
        registry.add(&after);
        registry.tick(&Context::new(&game_loop, Phase::Update, 1)).unwrap();
        registry.tick(&Context::new(&game_loop, Phase::Update, 2)).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(sink.len(), 2);
    }
}
