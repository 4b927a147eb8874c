//! Commands typed into the dashboard and their effect on the loop.
//!
//! The dashboard runs on its own thread, so every command that touches the loop goes through
//! the loop's invoke queues. The only state shared directly is a pair of atomics read by
//! callbacks installed with [`Controls::attach`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Instant,
};

use log::{info, warn};
use rusty_loop::core::{
    FrameDriver, GameLoop, LoopError, Phase, StopHandle, ThreadViolation, TickKind, from_fn,
};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request a quit through the quit protocol.
    Quit,
    /// Toggle the before-quit guard that cancels quit requests.
    Guard,
    /// Measure the round trip to the loop thread.
    Ping,
    /// Make an updatable fail once.
    Fault,
    /// Stop the loop without the quit protocol and leave.
    Exit,
    Help,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "q" | "quit" => Command::Quit,
            "g" | "guard" => Command::Guard,
            "p" | "ping" => Command::Ping,
            "f" | "fault" => Command::Fault,
            "x" | "exit" => Command::Exit,
            "h" | "help" => Command::Help,
            other => Command::Unknown(other.to_owned()),
        }
    }
}

pub const HELP: &str = "q quit | g guard | p ping | f fault | x exit | Esc stop";

/// Handles the dashboard uses to steer a running loop.
pub struct Controls {
    game_loop: Arc<GameLoop>,
    stop: StopHandle,
    guard: Arc<AtomicBool>,
    pending_faults: Arc<AtomicU32>,
    exit: bool,
}

impl Controls {
    pub fn new(driver: &FrameDriver) -> Self {
        Self {
            game_loop: Arc::clone(driver.game_loop()),
            stop: driver.stop_handle(),
            guard: Arc::new(AtomicBool::new(false)),
            pending_faults: Arc::new(AtomicU32::new(0)),
            exit: false,
        }
    }

    /// Install the quit guard observer and the fault injector. Must run before the loop thread
    /// claims ownership.
    pub fn attach(&self) -> Result<(), ThreadViolation> {
        let guard = Arc::clone(&self.guard);
        self.game_loop.on_before_quit(move |game_loop, event| {
            if guard.load(Ordering::SeqCst) {
                warn!("Quit at tick {} cancelled by guard", event.simulation_tick);
                game_loop.cancel_quit();
            }
        })?;

        let pending = Arc::clone(&self.pending_faults);
        let injector = from_fn(move |ctx| {
            let fire = pending
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fire {
                anyhow::bail!("fault injected at tick {}", ctx.tick());
            }
            Ok(())
        });
        self.game_loop.register(Phase::TardyUpdate, &injector)?;
        Ok(())
    }

    pub fn game_loop(&self) -> &Arc<GameLoop> {
        &self.game_loop
    }

    pub fn guard_enabled(&self) -> bool {
        self.guard.load(Ordering::SeqCst)
    }

    /// `true` once the user asked to leave.
    pub fn exit_requested(&self) -> bool {
        self.exit
    }

    /// Stop the loop after its current frame and leave.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.exit = true;
    }

    /// Apply a command, returning a status line.
    pub fn execute(&mut self, command: &Command) -> Result<String, LoopError> {
        Ok(match command {
            Command::Quit => {
                let game_loop = Arc::clone(&self.game_loop);
                self.game_loop.schedule_on(Phase::Update, move || {
                    match game_loop.request_quit() {
                        Ok(outcome) => info!("Quit request: {outcome:?}"),
                        Err(err) => warn!("Quit request failed: {err}"),
                    }
                })?;
                "quit requested".to_owned()
            }
            Command::Guard => {
                let enabled = !self.guard.fetch_xor(true, Ordering::SeqCst);
                format!("quit guard {}", if enabled { "on" } else { "off" })
            }
            Command::Ping => {
                let sent = Instant::now();
                let game_loop = Arc::clone(&self.game_loop);
                self.game_loop.invoke_next(TickKind::Simulation, move || {
                    info!(
                        "pong after {:?} at tick {}",
                        sent.elapsed(),
                        game_loop.simulation_tick_count()
                    );
                });
                "ping sent".to_owned()
            }
            Command::Fault => {
                self.pending_faults.fetch_add(1, Ordering::SeqCst);
                "fault armed".to_owned()
            }
            Command::Exit => {
                self.stop();
                "exiting".to_owned()
            }
            Command::Help => HELP.to_owned(),
            Command::Unknown(line) if line.is_empty() => String::new(),
            Command::Unknown(line) => format!("unknown command '{line}', try 'help'"),
        })
    }
}
