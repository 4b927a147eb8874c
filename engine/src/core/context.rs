use crate::core::{GameLoop, phase::Phase};

/// What an updatable sees while it is ticked.
///
/// The context borrows the loop itself, so an updatable may register or unregister other
/// updatables (or itself), schedule jobs, or subscribe observers while it runs.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    game_loop: &'a GameLoop,
    phase: Phase,
    tick: u64,
}

impl<'a> Context<'a> {
    pub(crate) fn new(game_loop: &'a GameLoop, phase: Phase, tick: u64) -> Self {
        Self {
            game_loop,
            phase,
            tick,
        }
    }

    /// The loop being advanced.
    #[inline]
    pub fn game_loop(&self) -> &'a GameLoop {
        self.game_loop
    }

    /// The phase being advanced.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Tick count of the phase's kind. Late phases report the simulation tick they follow.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }
}
