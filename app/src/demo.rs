//! Sample updatables driven by the app.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, info};
use rusty_loop::core::{GameLoop, Phase, ThreadViolation, from_fn};

/// Register the demo updatables and observers.
///
/// With `quit_after`, the simulation requests a quit once that many simulation ticks ran.
pub fn install(game_loop: &GameLoop, quit_after: Option<u64>) -> Result<(), ThreadViolation> {
    let steps = Arc::new(AtomicU64::new(0));

    let physics = {
        let steps = Arc::clone(&steps);
        from_fn(move |_| {
            steps.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    };
    game_loop.register(Phase::FixedUpdate, &physics)?;

    let heartbeat = {
        let steps = Arc::clone(&steps);
        from_fn(move |ctx| {
            if ctx.tick() % 120 == 0 {
                info!(
                    "tick {} ({} physics steps)",
                    ctx.tick(),
                    steps.load(Ordering::Relaxed)
                );
            }
            if quit_after.is_some_and(|limit| ctx.tick() >= limit) {
                ctx.game_loop().request_quit()?;
            }
            Ok(())
        })
    };
    game_loop.register(Phase::Update, &heartbeat)?;

    game_loop.on_phase_completed(Phase::TardyLateUpdate, |_, event| {
        if event.tick % 600 == 0 {
            debug!("frame {} complete", event.tick);
        }
    })?;
    game_loop.on_quit(|game_loop, event| {
        info!(
            "quit after {} ticks ({} fixed)",
            event.simulation_tick,
            game_loop.fixed_tick_count()
        );
    })?;
    Ok(())
}
