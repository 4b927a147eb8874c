//! Worker threads posting results to the loop thread.
//!
//! This example shows:
//! - Registering updatables before the loop thread exists
//! - Producers on other threads scheduling jobs onto `Update`
//! - A before-quit observer holding off the quit until all work has landed
//! - Shutting down through the quit protocol

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use rusty_loop::core::{
    Config, FrameDriver, GameLoop, LoopThread, Phase, QuitOutcome, TickKind, from_fn, runner,
};

const WORKERS: u64 = 4;
const JOBS_PER_WORKER: u64 = 25;

fn main() -> anyhow::Result<()> {
    println!("=============================================================");
    println!("Threaded dispatch");
    println!("=============================================================");

    let game_loop = Arc::new(GameLoop::new());
    let landed = Arc::new(AtomicU64::new(0));

    // ========================================================================
    // Setup, on the main thread before the loop thread claims ownership
    // ========================================================================

    let reporter = from_fn(|ctx| {
        if ctx.tick() % 30 == 0 {
            println!("frame {} ({} fixed ticks)", ctx.tick(), ctx.game_loop().fixed_tick_count());
        }
        Ok(())
    });
    game_loop.register(Phase::LateUpdate, &reporter)?;

    {
        let landed = Arc::clone(&landed);
        game_loop.on_before_quit(move |game_loop, event| {
            let done = landed.load(Ordering::SeqCst);
            if done < WORKERS * JOBS_PER_WORKER {
                println!("quit at tick {} held off, {done} jobs landed", event.simulation_tick);
                game_loop.cancel_quit();
            }
        })?;
    }
    game_loop.on_quit(|game_loop, _| {
        println!("quit after {} frames", game_loop.simulation_tick_count());
    })?;

    let config = Config {
        frame_sleep_micros: 2_000,
        ..Config::default()
    };
    let driver = FrameDriver::new(Arc::clone(&game_loop), &config);
    let loop_thread = LoopThread::spawn(driver, runner::looped)?;

    // ========================================================================
    // Producers
    // ========================================================================

    thread::scope(|s| {
        for worker in 0..WORKERS {
            let game_loop = Arc::clone(&game_loop);
            let landed = Arc::clone(&landed);
            s.spawn(move || {
                for job in 0..JOBS_PER_WORKER {
                    let landed = Arc::clone(&landed);
                    let result = worker * 1000 + job;
                    game_loop.invoke_next(TickKind::Simulation, move || {
                        landed.fetch_add(1, Ordering::SeqCst);
                        log::trace!("result {result} landed");
                    });
                    thread::sleep(Duration::from_millis(1));
                }
            });
        }
    });

    // Ask for a quit every few frames until the guard lets it through.
    while !loop_thread.is_finished() {
        let quitter = Arc::clone(&game_loop);
        game_loop.schedule_on(Phase::Update, move || {
            if let Ok(QuitOutcome::Terminating) = quitter.request_quit() {
                println!("quit accepted");
            }
        })?;
        thread::sleep(Duration::from_millis(20));
    }

    println!("{}", loop_thread.join());
    println!("{} jobs landed", landed.load(Ordering::SeqCst));
    Ok(())
}
