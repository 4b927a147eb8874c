//! Benchmark utilities for the game loop.
//!
//! - **Microbenchmarks**: single loop operations (registry pass, queue drain, observer notify)
//! - **Scenario benchmarks**: registration churn and cross-thread dispatch over full frames
//! - **Frame timing**: per-frame distribution of a driven loop
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_loop_bench
//!
//! # Run a specific group
//! cargo bench -p rusty_loop_bench -- invoke
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports.

pub mod frame_timer;
pub mod scenarios;
