//! Game loop workload scenarios.
//!
//! Each scenario builds a [`GameLoop`](rusty_loop::core::GameLoop) with a representative
//! population of updatables and drives it frame by frame.
//!
//! # Scenarios
//!
//! - **Churn**: many updatables registering and unregistering each other mid-tick
//! - **Dispatch**: producer threads flooding the invoke queues between frames

pub mod churn;
pub mod dispatch;

pub use churn::{ChurnConfig, ChurnScenario};
pub use dispatch::{DispatchConfig, DispatchScenario};

use rusty_loop::core::LoopError;

/// Common trait for benchmark scenarios.
pub trait Scenario {
    /// Human-readable name of the scenario.
    fn name(&self) -> &'static str;

    /// Brief description of what this scenario stresses.
    fn description(&self) -> &'static str;

    /// Number of updatables the scenario keeps registered.
    fn updatable_count(&self) -> usize;

    /// Register the scenario's updatables and observers.
    fn setup(&mut self) -> Result<(), LoopError>;

    /// Run one frame.
    fn update(&mut self) -> Result<(), LoopError>;

    /// Shut the loop down.
    fn teardown(&mut self) -> Result<(), LoopError>;
}
