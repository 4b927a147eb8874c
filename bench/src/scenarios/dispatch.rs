//! Cross-thread dispatch scenario.
//!
//! Producer threads post jobs onto the invoke queues while the loop sits between frames, then
//! one frame drains them. Jobs are spread over the simulation and fixed queues, with a random
//! share of them scheduled through `schedule_on(Update)` instead of `invoke_next`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rusty_loop::core::{
    Config, FrameDriver, GameLoop, LoopError, Phase, TickKind, from_fn, time::SIXTY_FPS,
};

use crate::scenarios::Scenario;

/// Configuration for the dispatch benchmark.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Producer threads posting each frame.
    pub producers: usize,
    /// Jobs posted per frame across all producers.
    pub jobs_per_frame: usize,
    /// Updatables ticked alongside the jobs.
    pub updatables: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            jobs_per_frame: 1_000,
            updatables: 100,
            seed: 12345,
        }
    }
}

pub struct DispatchScenario {
    config: DispatchConfig,
    driver: FrameDriver,
    rng: ChaCha8Rng,
    landed: Arc<AtomicU64>,
}

impl DispatchScenario {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let driver = FrameDriver::new(Arc::new(GameLoop::new()), &Config::default());
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            driver,
            landed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn game_loop(&self) -> &Arc<GameLoop> {
        self.driver.game_loop()
    }

    /// Jobs that have run on the loop thread.
    pub fn landed(&self) -> u64 {
        self.landed.load(Ordering::Relaxed)
    }

    /// Post one frame's worth of jobs from the producer threads.
    pub fn produce(&mut self) -> Result<(), LoopError> {
        let producers = self.config.producers.max(1);
        let share = self.config.jobs_per_frame / producers;
        let extra = self.config.jobs_per_frame % producers;
        let seeds: Vec<u64> = (0..producers).map(|_| self.rng.r#gen()).collect();
        let game_loop = self.driver.game_loop();
        let landed = &self.landed;

        thread::scope(|s| {
            let workers: Vec<_> = seeds
                .into_iter()
                .enumerate()
                .map(|(index, seed)| {
                    let jobs = share + usize::from(index < extra);
                    s.spawn(move || post_jobs(game_loop, landed, jobs, seed))
                })
                .collect();
            workers
                .into_iter()
                .try_for_each(|worker| worker.join().unwrap_or(Ok(())))
        })
    }
}

fn post_jobs(
    game_loop: &GameLoop,
    landed: &Arc<AtomicU64>,
    jobs: usize,
    seed: u64,
) -> Result<(), LoopError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..jobs {
        let landed = Arc::clone(landed);
        let job = move || {
            landed.fetch_add(1, Ordering::Relaxed);
        };
        match rng.gen_range(0..3) {
            0 => game_loop.invoke_next(TickKind::Fixed, job),
            1 => game_loop.schedule_on(Phase::Update, job)?,
            _ => game_loop.invoke_next(TickKind::Simulation, job),
        }
    }
    Ok(())
}

impl Default for DispatchScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for DispatchScenario {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn description(&self) -> &'static str {
        "Producer threads flooding the invoke queues between frames"
    }

    fn updatable_count(&self) -> usize {
        self.config.updatables
    }

    fn setup(&mut self) -> Result<(), LoopError> {
        let game_loop = self.game_loop();
        for _ in 0..self.config.updatables {
            let updatable = from_fn(|ctx| {
                std::hint::black_box(ctx.game_loop().simulation_tick_id());
                Ok(())
            });
            game_loop.register(Phase::Update, &updatable)?;
        }
        Ok(())
    }

    fn update(&mut self) -> Result<(), LoopError> {
        self.produce()?;
        self.driver
            .frame_with_delta(Duration::from_nanos(SIXTY_FPS))
            .map(|_| ())
    }

    fn teardown(&mut self) -> Result<(), LoopError> {
        self.driver.shutdown().map(|_| ())
    }
}
