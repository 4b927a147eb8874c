use log::{error, info};

use crate::core::{frame::FrameDriver, runner::RunResult};

/// Run frames until the driver is stopped or the loop quits, then confirm shutdown.
pub fn looped(driver: &mut FrameDriver) -> RunResult {
    while !driver.should_stop() {
        if let Err(err) = driver.frame() {
            error!("Frame failed: {err}");
            return RunResult::Failed(err);
        }
        if let Some(sleep) = driver.frame_sleep() {
            std::thread::sleep(sleep);
        }
    }

    info!("Ending loop after {} frames", driver.frames());
    match driver.shutdown() {
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
    use crate::core::{
        GameLoop,
        config::Config,
        phase::Phase,
        quit::{QuitOutcome, QuitState},
        registry::from_fn,
    };

    #[test]
    fn runs_until_quit_request_survives() {
        let game_loop = Arc::new(GameLoop::new());
        let requester = from_fn(|ctx| {
            if ctx.tick() == 3 {
                assert_eq!(ctx.game_loop().request_quit()?, QuitOutcome::Terminating);
            }
            Ok(())
        });
        game_loop.register(Phase::Update, &requester).unwrap();
        let config = Config {
            frame_sleep_micros: 0,
            ..Config::default()
        };
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &config);

        let result = looped(&mut driver);

        assert!(matches!(result, RunResult::Stopped { frames: 3 }));
        assert_eq!(game_loop.quit_state(), QuitState::Quit);
    }

    #[test]
    fn stop_handle_ends_loop() {
        let game_loop = Arc::new(GameLoop::new());
        let config = Config {
            frame_sleep_micros: 0,
            ..Config::default()
        };
        let mut driver = FrameDriver::new(Arc::clone(&game_loop), &config);
        let stop = driver.stop_handle();
        let stopper = from_fn(move |_| {
            stop.stop();
            Ok(())
        });
        game_loop.register(Phase::LateUpdate, &stopper).unwrap();

        let result = looped(&mut driver);

        assert!(matches!(result, RunResult::Stopped { frames: 1 }));
        // Stopping without a quit request still confirms shutdown.
        assert_eq!(game_loop.quit_state(), QuitState::Quit);
    }
}
