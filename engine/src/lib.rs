//! # rusty_loop
//!
//! A frame-phase update scheduler with cross-thread dispatch.
//!
//! The [`GameLoop`](core::GameLoop) runs nine phases grouped into three tick kinds. Each phase
//! ticks a registry of [`Updatable`](core::Updatable)s, the primary phases first drain a queue
//! of jobs posted from any thread, and every phase raises a completion notification:
//!
//! ```text
//! Simulation  EarlyUpdate      ─► Update*      ─► TardyUpdate
//! Fixed       EarlyFixedUpdate ─► FixedUpdate* ─► TardyFixedUpdate
//! Late        EarlyLateUpdate  ─► LateUpdate*  ─► TardyLateUpdate
//!                                 (* drains its invoke queue first)
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rusty_loop::core::{Config, FrameDriver, GameLoop, LoopThread, Phase, from_fn, runner};
//!
//! let game_loop = Arc::new(GameLoop::new());
//! let spinner = from_fn(|ctx| {
//!     log::info!("frame {}", ctx.tick());
//!     Ok(())
//! });
//! game_loop.register(Phase::Update, &spinner)?;
//!
//! let driver = FrameDriver::new(Arc::clone(&game_loop), &Config::default());
//! let thread = LoopThread::spawn(driver, runner::looped)?;
//!
//! // Any thread may post work to the loop thread.
//! game_loop.schedule_on(Phase::Update, || log::info!("hello from the loop thread"))?;
//!
//! // Quit requests are owner-only, so they are posted too.
//! let quitter = Arc::clone(&game_loop);
//! game_loop.schedule_on(Phase::Update, move || {
//!     let _ = quitter.request_quit();
//! })?;
//! thread.join();
//! ```

pub mod core;
