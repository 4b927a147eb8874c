use crate::core::{frame::FrameDriver, runner::RunResult};

/// Run a single frame.
pub fn once(driver: &mut FrameDriver) -> RunResult {
    match driver.frame() {
        Ok(_) => RunResult::Stopped {
            frames: driver.frames(),
        },
        Err(err) => RunResult::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::{GameLoop, config::Config, error::LoopError};

    #[test]
    fn runs_exactly_one_frame() {
        let game_loop = Arc::new(GameLoop::new());
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &Config::default());

        let result = once(&mut driver);

        assert!(matches!(result, RunResult::Stopped { frames: 1 }));
        assert_eq!(game_loop.simulation_tick_count(), 1);
    }

    #[test]
    fn reports_failed_advance() {
        let game_loop = Arc::new(GameLoop::new());
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &Config::default());
        // Claim the loop from a thread that then goes away.
        std::thread::scope(|s| {
            s.spawn(|| game_loop.establish_owner().map(|_| ()));
        });

        let result = once(&mut driver);

        assert!(matches!(result, RunResult::Failed(LoopError::ThreadViolation(_))));
        assert_eq!(game_loop.simulation_tick_count(), 0);
    }
}
