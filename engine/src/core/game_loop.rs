//! The phase sequencer.
//!
//! A [`GameLoop`] owns one [`UpdateRegistry`] per [`Phase`], one [`InvokeQueue`] per primary
//! phase, the phase-completed observer lists and the quit protocol. The host drives it by
//! advancing phases in order from a single thread:
//!
//! ```text
//! advance(phase)
//!   ├─ establish / check owning thread
//!   ├─ count a new tick        (Early phases of Simulation and Fixed)
//!   ├─ drain the invoke queue  (primary phases only)
//!   ├─ tick the registry       (insertion order, faults isolated)
//!   └─ notify phase observers  (subscription order, faults isolated)
//! ```
//!
//! Every step of a phase completes before the next phase may start. A phase advanced from
//! inside a callback of another phase is rejected with [`LoopError::ReentrantAdvance`].
//!
//! The loop is `Send + Sync` and is usually shared as an `Arc<GameLoop>`: any thread may
//! schedule jobs and read counters, while only the owning thread advances phases.

use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::core::{
    context::Context,
    error::{LoopError, ThreadViolation},
    fault::{FaultOrigin, FaultSink, LogSink},
    invoke::InvokeQueue,
    observer::{ObserverList, PhaseEvent, QuitEvent, Subscription, Topic},
    phase::{Phase, Stage, TickKind},
    quit::{NoopTerminate, QuitMachine, QuitOutcome, QuitState, Terminate},
    registry::{UpdateRegistry, Updatable},
    roster::PassError,
    thread::{Owner, ThreadAffinity},
};

/// Mask applied to tick counts for the 31-bit tick ids.
pub const TICK_ID_MASK: u64 = 0x7FFF_FFFF;

const NO_PHASE: u8 = u8::MAX;

/// Configures and constructs a [`GameLoop`].
#[derive(Default)]
pub struct Builder {
    sink: Option<Arc<dyn FaultSink>>,
    terminator: Option<Arc<dyn Terminate>>,
}

impl Builder {
    /// Where faults raised by callbacks are reported. Defaults to [`LogSink`].
    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// What a surviving quit request invokes. Defaults to [`NoopTerminate`].
    pub fn terminator(mut self, terminator: Arc<dyn Terminate>) -> Self {
        self.terminator = Some(terminator);
        self
    }

    pub fn build(self) -> GameLoop {
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));
        let terminator = self
            .terminator
            .unwrap_or_else(|| Arc::new(NoopTerminate));
        let affinity = Arc::new(ThreadAffinity::new());

        GameLoop {
            registries: std::array::from_fn(|index| {
                UpdateRegistry::new(Phase::ALL[index], Arc::clone(&sink))
            }),
            queues: std::array::from_fn(|slot| {
                InvokeQueue::new(
                    TickKind::ALL[slot].primary(),
                    Arc::clone(&affinity),
                    Arc::clone(&sink),
                )
            }),
            phase_observers: std::array::from_fn(|index| {
                let phase = Phase::ALL[index];
                ObserverList::new(Topic::PhaseCompleted(phase), FaultOrigin::PhaseObserver(phase))
            }),
            before_quit: ObserverList::new(Topic::BeforeQuit, FaultOrigin::BeforeQuitObserver),
            quit: ObserverList::new(Topic::Quit, FaultOrigin::QuitObserver),
            quit_state: QuitMachine::new(),
            terminator: RwLock::new(terminator),
            simulation_ticks: AtomicU64::new(0),
            fixed_ticks: AtomicU64::new(0),
            current_phase: AtomicU8::new(NO_PHASE),
            last_phase: std::array::from_fn(|_| AtomicU8::new(NO_PHASE)),
            next_subscription: AtomicU64::new(1),
            affinity,
            sink,
        }
    }
}

/// Ordered multi-phase frame scheduler.
pub struct GameLoop {
    affinity: Arc<ThreadAffinity>,
    sink: Arc<dyn FaultSink>,
    terminator: RwLock<Arc<dyn Terminate>>,
    registries: [UpdateRegistry; Phase::COUNT],
    queues: [InvokeQueue; 3],
    phase_observers: [ObserverList<PhaseEvent>; Phase::COUNT],
    before_quit: ObserverList<QuitEvent>,
    quit: ObserverList<QuitEvent>,
    quit_state: QuitMachine,
    simulation_ticks: AtomicU64,
    fixed_ticks: AtomicU64,
    current_phase: AtomicU8,
    /// Last phase started per tick kind, for order diagnostics.
    last_phase: [AtomicU8; 3],
    next_subscription: AtomicU64,
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the running phase when an advance ends, including early returns.
struct RunningPhase<'a>(&'a AtomicU8);

impl Drop for RunningPhase<'_> {
    fn drop(&mut self) {
        self.0.store(NO_PHASE, Ordering::Release);
    }
}

impl GameLoop {
    /// A loop reporting faults to the log and with no terminate capability.
    pub fn new() -> Self {
        Builder::default().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    // ==================== Phase Advance ====================

    /// Run one phase: drain its queue, tick its registry, notify its observers.
    ///
    /// The first call claims the calling thread as owner. Calls from any other thread fail with
    /// [`LoopError::ThreadViolation`].
    pub fn advance(&self, phase: Phase) -> Result<(), LoopError> {
        self.affinity.establish("GameLoop::advance")?;
        if self
            .current_phase
            .compare_exchange(NO_PHASE, phase as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LoopError::ReentrantAdvance(phase));
        }
        let _running = RunningPhase(&self.current_phase);

        self.check_order(phase);
        let tick = self.begin_tick(phase);
        let ctx = Context::new(self, phase, tick);

        let drained = match self.queue(phase) {
            Some(queue) => queue.drain()?,
            None => 0,
        };
        let ticked = self.registries[phase.index()].tick(&ctx)?;
        let notified = self.phase_observers[phase.index()]
            .notify(self, &PhaseEvent { phase, tick }, &*self.sink)
            .map_err(|err| err.into_loop_error(|| LoopError::ReentrantNotify("phase-completed")))?;

        trace!(
            "{phase} tick {tick}: drained {drained} jobs, ticked {ticked} updatables, notified {notified} observers"
        );
        Ok(())
    }

    /// Advance the three phases of a tick kind in order.
    pub fn advance_kind(&self, kind: TickKind) -> Result<(), LoopError> {
        for phase in kind.phases() {
            self.advance(phase)?;
        }
        Ok(())
    }

    pub fn early_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::EarlyUpdate)
    }

    pub fn update(&self) -> Result<(), LoopError> {
        self.advance(Phase::Update)
    }

    pub fn tardy_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::TardyUpdate)
    }

    pub fn early_fixed_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::EarlyFixedUpdate)
    }

    pub fn fixed_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::FixedUpdate)
    }

    pub fn tardy_fixed_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::TardyFixedUpdate)
    }

    pub fn early_late_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::EarlyLateUpdate)
    }

    pub fn late_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::LateUpdate)
    }

    pub fn tardy_late_update(&self) -> Result<(), LoopError> {
        self.advance(Phase::TardyLateUpdate)
    }

    /// The phase currently being advanced, if any. Callable from any thread.
    pub fn current_phase(&self) -> Option<Phase> {
        Phase::from_index(self.current_phase.load(Ordering::Acquire) as usize)
    }

    fn check_order(&self, phase: Phase) {
        let last = &self.last_phase[phase.kind().index()];
        let previous = Phase::from_index(last.swap(phase as u8, Ordering::AcqRel) as usize);
        let in_order = match phase.stage() {
            Stage::Early => previous.is_none_or(|previous| previous == phase.kind().tardy()),
            Stage::Primary | Stage::Tardy => previous == phase.predecessor(),
        };
        if !in_order {
            warn!(
                "{phase} advanced out of order (previous {} phase: {})",
                phase.kind(),
                previous.map_or("none", Phase::name)
            );
        }
    }

    /// Count a new tick if the phase starts one, and return the tick the phase belongs to.
    fn begin_tick(&self, phase: Phase) -> u64 {
        let counter = match phase.kind() {
            TickKind::Simulation => &self.simulation_ticks,
            TickKind::Fixed => &self.fixed_ticks,
            TickKind::Late => return self.simulation_tick_count(),
        };
        if phase.starts_tick() {
            counter.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            counter.load(Ordering::Acquire)
        }
    }

    // ==================== Registration ====================

    /// Register an updatable with a phase. Returns `false` if it was already registered.
    ///
    /// Allowed from any thread until an owner is established, then only from the owner.
    pub fn register(
        &self,
        phase: Phase,
        handle: &Arc<dyn Updatable>,
    ) -> Result<bool, ThreadViolation> {
        self.affinity.check("GameLoop::register")?;
        Ok(self.registries[phase.index()].add(handle))
    }

    /// Register by phase name, e.g. `"FixedUpdate"`.
    pub fn register_by_name(
        &self,
        name: &str,
        handle: &Arc<dyn Updatable>,
    ) -> Result<bool, LoopError> {
        let phase: Phase = name.parse()?;
        Ok(self.register(phase, handle)?)
    }

    /// Unregister an updatable. Returns `false` if it was not registered with the phase.
    pub fn unregister(
        &self,
        phase: Phase,
        handle: &Arc<dyn Updatable>,
    ) -> Result<bool, ThreadViolation> {
        self.affinity.check("GameLoop::unregister")?;
        Ok(self.registries[phase.index()].remove(handle))
    }

    pub fn is_registered(&self, phase: Phase, handle: &Arc<dyn Updatable>) -> bool {
        self.registries[phase.index()].contains(handle)
    }

    /// The registry of a phase, for inspection.
    pub fn registry(&self, phase: Phase) -> &UpdateRegistry {
        &self.registries[phase.index()]
    }

    // ==================== Cross-Thread Dispatch ====================

    /// Run `job` on the owning thread at the start of the next advance of `phase`.
    ///
    /// Callable from any thread. Only primary phases own a queue.
    pub fn schedule_on<F>(&self, phase: Phase, job: F) -> Result<(), LoopError>
    where
        F: FnOnce() + Send + 'static,
    {
        let queue = self.queue(phase).ok_or(LoopError::NoInvokeQueue(phase))?;
        queue.enqueue(job);
        Ok(())
    }

    /// Run `job` at the next primary phase of `kind`.
    pub fn invoke_next<F>(&self, kind: TickKind, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queues[kind.index()].enqueue(job);
    }

    /// The invoke queue of a primary phase.
    pub fn queue(&self, phase: Phase) -> Option<&InvokeQueue> {
        phase.queue_slot().map(|slot| &self.queues[slot])
    }

    // ==================== Observers ====================

    fn next_id(&self) -> u64 {
        self.next_subscription.fetch_add(1, Ordering::Relaxed)
    }

    /// Observe the completion of a phase.
    pub fn on_phase_completed<F>(
        &self,
        phase: Phase,
        observer: F,
    ) -> Result<Subscription, ThreadViolation>
    where
        F: Fn(&GameLoop, &PhaseEvent) + Send + Sync + 'static,
    {
        self.affinity.check("GameLoop::on_phase_completed")?;
        Ok(self.phase_observers[phase.index()].subscribe(self.next_id(), observer))
    }

    /// Observe quit requests. The observer may call [`cancel_quit`](Self::cancel_quit).
    pub fn on_before_quit<F>(&self, observer: F) -> Result<Subscription, ThreadViolation>
    where
        F: Fn(&GameLoop, &QuitEvent) + Send + Sync + 'static,
    {
        self.affinity.check("GameLoop::on_before_quit")?;
        Ok(self.before_quit.subscribe(self.next_id(), observer))
    }

    /// Observe the confirmed shutdown.
    pub fn on_quit<F>(&self, observer: F) -> Result<Subscription, ThreadViolation>
    where
        F: Fn(&GameLoop, &QuitEvent) + Send + Sync + 'static,
    {
        self.affinity.check("GameLoop::on_quit")?;
        Ok(self.quit.subscribe(self.next_id(), observer))
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> Result<bool, ThreadViolation> {
        self.affinity.check("GameLoop::unsubscribe")?;
        let id = subscription.id();
        Ok(match subscription.topic() {
            Topic::PhaseCompleted(phase) => self.phase_observers[phase.index()].unsubscribe(id),
            Topic::BeforeQuit => self.before_quit.unsubscribe(id),
            Topic::Quit => self.quit.unsubscribe(id),
        })
    }

    // ==================== Thread Identity ====================

    pub fn is_owning_thread(&self) -> bool {
        self.affinity.is_owner()
    }

    /// `true` if the caller must go through [`schedule_on`](Self::schedule_on).
    pub fn invoke_required(&self) -> bool {
        !self.is_owning_thread()
    }

    /// Fails unless called from the owning thread. Also fails before any owner exists.
    pub fn assert_owning_thread(&self) -> Result<(), ThreadViolation> {
        self.affinity.require("GameLoop::assert_owning_thread")
    }

    /// The owning thread, once established.
    pub fn owner(&self) -> Option<&Owner> {
        self.affinity.owner()
    }

    /// Claim the calling thread as owner without advancing a phase.
    pub fn establish_owner(&self) -> Result<&Owner, ThreadViolation> {
        self.affinity.establish("GameLoop::establish_owner")
    }

    // ==================== Quit Protocol ====================

    /// Ask the application to quit.
    ///
    /// Only effective from [`QuitState::None`]. Raises the before-quit notification; if no
    /// observer cancels, invokes the terminate capability and stays in
    /// [`QuitState::BeforeQuit`] until [`notify_shutdown`](Self::notify_shutdown).
    pub fn request_quit(&self) -> Result<QuitOutcome, LoopError> {
        self.affinity.check("GameLoop::request_quit")?;
        if !self.quit_state.begin_request() {
            return Ok(QuitOutcome::Ignored);
        }
        debug!("quit requested");

        let event = QuitEvent {
            state: QuitState::BeforeQuit,
            simulation_tick: self.simulation_tick_count(),
        };
        match self.before_quit.notify(self, &event, &*self.sink) {
            Ok(_) => {}
            Err(PassError::Busy) => {
                // Cancelled and re-requested from inside the notification.
                self.quit_state.cancel();
                return Ok(QuitOutcome::Ignored);
            }
            Err(PassError::Corrupt(corruption)) => return Err(corruption.into()),
        }

        if self.quit_state.state() != QuitState::BeforeQuit {
            debug!("quit cancelled by observer");
            return Ok(QuitOutcome::Cancelled);
        }

        let terminator = Arc::clone(&*self.terminator.read());
        terminator.terminate();
        Ok(QuitOutcome::Terminating)
    }

    /// Abort a quit request. Only effective in [`QuitState::BeforeQuit`].
    pub fn cancel_quit(&self) -> bool {
        let cancelled = self.quit_state.cancel();
        if cancelled {
            debug!("quit cancel requested");
        }
        cancelled
    }

    /// Host confirmation that the application is shutting down.
    ///
    /// Moves to the terminal [`QuitState::Quit`] and raises the quit notification. Returns
    /// `false` if the loop had already quit.
    pub fn notify_shutdown(&self) -> Result<bool, LoopError> {
        self.affinity.check("GameLoop::notify_shutdown")?;
        if !self.quit_state.finish() {
            return Ok(false);
        }
        debug!("shutdown confirmed");

        let event = QuitEvent {
            state: QuitState::Quit,
            simulation_tick: self.simulation_tick_count(),
        };
        self.quit
            .notify(self, &event, &*self.sink)
            .map_err(|err| err.into_loop_error(|| LoopError::ReentrantNotify("quit")))?;
        Ok(true)
    }

    pub fn quit_state(&self) -> QuitState {
        self.quit_state.state()
    }

    /// Replace the terminate capability, returning the one it replaces.
    pub fn set_terminator(&self, terminator: Arc<dyn Terminate>) -> Arc<dyn Terminate> {
        std::mem::replace(&mut *self.terminator.write(), terminator)
    }

    /// Add a terminate capability that runs after the installed one.
    pub fn chain_terminator(&self, next: Arc<dyn Terminate>) {
        let mut slot = self.terminator.write();
        let previous = Arc::clone(&*slot);
        let chained: Arc<dyn Terminate> = Arc::new(move || {
            previous.terminate();
            next.terminate();
        });
        *slot = chained;
    }

    // ==================== Counters ====================

    pub fn simulation_tick_count(&self) -> u64 {
        self.simulation_ticks.load(Ordering::Acquire)
    }

    pub fn fixed_tick_count(&self) -> u64 {
        self.fixed_ticks.load(Ordering::Acquire)
    }

    /// Wrap-tolerant 31-bit view of [`simulation_tick_count`](Self::simulation_tick_count).
    pub fn simulation_tick_id(&self) -> u32 {
        (self.simulation_tick_count() & TICK_ID_MASK) as u32
    }

    /// Wrap-tolerant 31-bit view of [`fixed_tick_count`](Self::fixed_tick_count).
    pub fn fixed_tick_id(&self) -> u32 {
        (self.fixed_tick_count() & TICK_ID_MASK) as u32
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("owner", &self.owner().map(Owner::id))
            .field("current_phase", &self.current_phase())
            .field("quit_state", &self.quit_state())
            .field("simulation_ticks", &self.simulation_tick_count())
            .field("fixed_ticks", &self.fixed_tick_count())
            .finish_non_exhaustive()
    }
}
