//! Reference host driver.
//!
//! A [`FrameDriver`] plays the role of the host environment: it turns wall-clock time into the
//! phase advances a [`GameLoop`] expects. One frame is
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Fixed      × n   (n = accumulated fixed steps, clamped)  │
//! │ Simulation × 1                                           │
//! │ Late       × 1                                           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Fixed ticks run before the simulation tick so variable-rate logic sees the latest fixed
//! state.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{info, warn};

use crate::core::{
    GameLoop,
    config::Config,
    error::LoopError,
    phase::TickKind,
    quit::{QuitState, Terminate},
    time::Time,
};

/// Cloneable flag that asks a driven loop to stop after its current frame.
///
/// Chained after the loop's terminate capability by [`FrameDriver::new`], so a quit request
/// that nobody cancels ends the run loop.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Terminate for StopHandle {
    fn terminate(&self) {
        info!("Stopping loop after quit request");
        self.stop();
    }
}

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame delta.
    pub delta: Duration,
    /// Fixed ticks advanced this frame.
    pub fixed_steps: u32,
    /// Fixed steps discarded because the frame exceeded the per-frame limit.
    pub dropped_steps: u64,
}

/// Drives a [`GameLoop`] frame by frame.
pub struct FrameDriver {
    game_loop: Arc<GameLoop>,
    time: Time,
    max_fixed_steps: u32,
    frame_sleep: Option<Duration>,
    stop: StopHandle,
    frames: u64,
}

impl FrameDriver {
    pub fn new(game_loop: Arc<GameLoop>, config: &Config) -> Self {
        let stop = StopHandle::new();
        game_loop.chain_terminator(Arc::new(stop.clone()));
        Self {
            game_loop,
            time: Time::from_config(config),
            max_fixed_steps: config.max_fixed_steps_per_frame,
            frame_sleep: config.frame_sleep(),
            stop,
            frames: 0,
        }
    }

    pub fn game_loop(&self) -> &Arc<GameLoop> {
        &self.game_loop
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame_sleep(&self) -> Option<Duration> {
        self.frame_sleep
    }

    /// Run one frame using wall-clock time since the previous frame.
    pub fn frame(&mut self) -> Result<FrameReport, LoopError> {
        self.time = self.time.next();
        self.run_frame()
    }

    /// Run one frame as if `delta` had elapsed.
    pub fn frame_with_delta(&mut self, delta: Duration) -> Result<FrameReport, LoopError> {
        self.time = self.time.advance_by(delta);
        self.run_frame()
    }

    fn run_frame(&mut self) -> Result<FrameReport, LoopError> {
        let mut fixed_steps = 0;
        while self.time.has_fixed() && fixed_steps < self.max_fixed_steps {
            self.time.increment_fixed();
            self.game_loop.advance_kind(TickKind::Fixed)?;
            fixed_steps += 1;
        }
        let dropped_steps = self.time.drop_backlog();
        if dropped_steps > 0 {
            warn!("Frame fell behind, dropped {dropped_steps} fixed steps");
        }

        self.game_loop.advance_kind(TickKind::Simulation)?;
        self.game_loop.advance_kind(TickKind::Late)?;
        self.frames += 1;

        Ok(FrameReport {
            delta: self.time.delta,
            fixed_steps,
            dropped_steps,
        })
    }

    /// `true` once stopped, or once the loop has quit.
    pub fn should_stop(&self) -> bool {
        self.stop.is_stopped() || self.game_loop.quit_state() == QuitState::Quit
    }

    /// Confirm shutdown to the loop, raising its quit notification.
    pub fn shutdown(&self) -> Result<bool, LoopError> {
        self.game_loop.notify_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use parking_lot::Mutex;

    use super::*;
    use crate::core::{phase::Phase, quit::QuitOutcome, registry::from_fn};

    fn config(step_nanos: u64, max_steps: u32) -> Config {
        Config {
            fixed_time_step_nanos: step_nanos,
            max_fixed_steps_per_frame: max_steps,
            frame_sleep_micros: 0,
        }
    }

    #[test]
    fn fixed_steps_run_before_simulation_tick() {
        let game_loop = Arc::new(GameLoop::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for phase in [Phase::LateUpdate, Phase::Update, Phase::FixedUpdate] {
            let log = Arc::clone(&log);
            let handle = from_fn(move |ctx| {
                log.lock().push(ctx.phase());
                Ok(())
            });
            game_loop.register(phase, &handle).unwrap();
        }
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &config(10, 8));

        let report = driver.frame_with_delta(Duration::from_nanos(25)).unwrap();

        assert_eq!(report.fixed_steps, 2);
        assert_eq!(report.dropped_steps, 0);
        assert_eq!(
            *log.lock(),
            vec![
                Phase::FixedUpdate,
                Phase::FixedUpdate,
                Phase::Update,
                Phase::LateUpdate
            ]
        );
        assert_eq!(game_loop.fixed_tick_count(), 2);
        assert_eq!(game_loop.simulation_tick_count(), 1);
        assert_eq!(driver.frames(), 1);
    }

    #[test]
    fn fixed_steps_are_clamped_per_frame() {
        let game_loop = Arc::new(GameLoop::new());
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &config(10, 3));

        let report = driver.frame_with_delta(Duration::from_nanos(105)).unwrap();

        assert_eq!(report.fixed_steps, 3);
        assert_eq!(report.dropped_steps, 7);
        assert_eq!(game_loop.fixed_tick_count(), 3);

        let report = driver.frame_with_delta(Duration::from_nanos(5)).unwrap();
        assert_eq!(report.fixed_steps, 1);
    }

    #[test]
    fn uncancelled_quit_stops_driver_and_shutdown_notifies_once() {
        let game_loop = Arc::new(GameLoop::new());
        let quits = Arc::new(AtomicU64::new(0));
        {
            let quits = Arc::clone(&quits);
            game_loop
                .on_quit(move |_, _| {
                    quits.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &config(10, 8));
        driver.frame_with_delta(Duration::ZERO).unwrap();
        assert!(!driver.should_stop());

        assert_eq!(game_loop.request_quit().unwrap(), QuitOutcome::Terminating);
        assert!(driver.should_stop());
        assert!(driver.shutdown().unwrap());
        assert!(!driver.shutdown().unwrap());

        assert_eq!(quits.load(Ordering::SeqCst), 1);
        assert_eq!(game_loop.quit_state(), QuitState::Quit);
    }

    #[test]
    fn quit_runs_builder_terminator_then_stops() {
        let calls = Arc::new(AtomicU64::new(0));
        let terminator = {
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        };
        let game_loop = Arc::new(GameLoop::builder().terminator(Arc::new(terminator)).build());
        let driver = FrameDriver::new(Arc::clone(&game_loop), &config(10, 8));

        assert_eq!(game_loop.request_quit().unwrap(), QuitOutcome::Terminating);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(driver.should_stop());
    }
}
