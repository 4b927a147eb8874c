//! Registration churn scenario.
//!
//! A population of cheap updatables spread across the three primary phases, plus one churner
//! registered last on `Update` that toggles random members in and out of their registries. Members
//! of `Update` are toggled while their own pass is running, so the registry's tombstone and
//! pending paths carry most of the cost.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_loop::core::{
    Config, FrameDriver, GameLoop, LoopError, Phase, Updatable, from_fn, time::SIXTY_FPS,
};

use crate::scenarios::Scenario;

const PHASES: [Phase; 3] = [Phase::Update, Phase::FixedUpdate, Phase::LateUpdate];

/// Configuration for the churn benchmark.
#[derive(Debug, Clone)]
pub struct ChurnConfig {
    /// Updatables in the population.
    pub updatables: usize,
    /// Registrations toggled per simulation tick.
    pub churn_per_tick: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            updatables: 1_000,
            churn_per_tick: 50,
            seed: 12345,
        }
    }
}

/// One member of the population and the phase it belongs to.
struct Member {
    phase: Phase,
    handle: Arc<dyn Updatable>,
}

pub struct ChurnScenario {
    config: ChurnConfig,
    driver: FrameDriver,
    ticks: Arc<AtomicU64>,
    toggles: Arc<AtomicU64>,
}

impl ChurnScenario {
    pub fn new() -> Self {
        Self::with_config(ChurnConfig::default())
    }

    pub fn with_config(config: ChurnConfig) -> Self {
        let driver = FrameDriver::new(Arc::new(GameLoop::new()), &Config::default());
        Self {
            config,
            driver,
            ticks: Arc::new(AtomicU64::new(0)),
            toggles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn game_loop(&self) -> &Arc<GameLoop> {
        self.driver.game_loop()
    }

    /// Updatable ticks observed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Registration toggles performed so far.
    pub fn toggles(&self) -> u64 {
        self.toggles.load(Ordering::Relaxed)
    }

    fn member(&self, index: usize) -> Member {
        let ticks = Arc::clone(&self.ticks);
        Member {
            phase: PHASES[index % PHASES.len()],
            handle: from_fn(move |ctx| {
                ticks.fetch_add(1, Ordering::Relaxed);
                std::hint::black_box(ctx.tick());
                Ok(())
            }),
        }
    }
}

impl Default for ChurnScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for ChurnScenario {
    fn name(&self) -> &'static str {
        "churn"
    }

    fn description(&self) -> &'static str {
        "Updatables toggled in and out of their registries during the frame"
    }

    fn updatable_count(&self) -> usize {
        self.config.updatables
    }

    fn setup(&mut self) -> Result<(), LoopError> {
        let members: Vec<Member> = (0..self.config.updatables)
            .map(|index| self.member(index))
            .collect();
        let game_loop = self.game_loop();
        for member in &members {
            game_loop.register(member.phase, &member.handle)?;
        }

        if members.is_empty() {
            return Ok(());
        }
        let churn_per_tick = self.config.churn_per_tick;
        let toggles = Arc::clone(&self.toggles);
        let state = Mutex::new((ChaCha8Rng::seed_from_u64(self.config.seed), members));
        let churner = from_fn(move |ctx| {
            let game_loop = ctx.game_loop();
            let mut state = state.lock();
            let (rng, members) = &mut *state;
            for _ in 0..churn_per_tick {
                let member = &members[rng.gen_range(0..members.len())];
                if !game_loop.register(member.phase, &member.handle)? {
                    game_loop.unregister(member.phase, &member.handle)?;
                }
            }
            toggles.fetch_add(churn_per_tick as u64, Ordering::Relaxed);
            Ok(())
        });
        game_loop.register(Phase::Update, &churner)?;
        Ok(())
    }

    fn update(&mut self) -> Result<(), LoopError> {
        self.driver
            .frame_with_delta(Duration::from_nanos(SIXTY_FPS))
            .map(|_| ())
    }

    fn teardown(&mut self) -> Result<(), LoopError> {
        self.driver.shutdown().map(|_| ())
    }
}
