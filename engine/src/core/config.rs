//! Host driver configuration, loaded from TOML.
//!
//! ```toml
//! fixed_time_step_nanos = 20_000_000   # 50 Hz fixed ticks
//! max_fixed_steps_per_frame = 4
//! frame_sleep_micros = 0
//! ```
//!
//! Every key is optional.

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::core::{error::LoopError, time::SIXTY_FPS};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Length of one fixed tick.
    pub fixed_time_step_nanos: u64,
    /// Upper bound on fixed ticks run in one frame. Backlog beyond it is dropped.
    pub max_fixed_steps_per_frame: u32,
    /// Sleep between frames of the looped runner. `0` disables sleeping.
    pub frame_sleep_micros: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixed_time_step_nanos: SIXTY_FPS,
            max_fixed_steps_per_frame: 8,
            frame_sleep_micros: 1000,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, LoopError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoopError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn frame_sleep(&self) -> Option<Duration> {
        (self.frame_sleep_micros > 0).then(|| Duration::from_micros(self.frame_sleep_micros))
    }
}
