use std::fmt;

use crate::core::error::LoopError;

mod looped;
mod once;

/// How a runner finished.
#[derive(Debug)]
pub enum RunResult {
    /// The driver was stopped or the loop quit.
    Stopped { frames: u64 },
    /// A phase advance returned a hard error.
    Failed(LoopError),
    /// The runner thread panicked.
    Panicked(String),
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Stopped { frames } => write!(f, "stopped after {frames} frames"),
            RunResult::Failed(err) => write!(f, "failed: {err}"),
            RunResult::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

pub use looped::looped;
pub use once::once;
