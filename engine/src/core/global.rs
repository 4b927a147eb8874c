//! Process-wide default loop for the composition root.
//!
//! Library code should take a `&GameLoop` or `Arc<GameLoop>` explicitly. The global exists so
//! an application's `main` can hand the same instance to collaborators that are constructed
//! far from it.

use std::sync::{Arc, OnceLock};

use crate::core::GameLoop;

static GLOBAL: OnceLock<Arc<GameLoop>> = OnceLock::new();

/// Install the process-wide loop. Returns the given loop back if one is already installed.
pub fn install(game_loop: Arc<GameLoop>) -> Result<(), Arc<GameLoop>> {
    GLOBAL.set(game_loop)
}

/// The installed loop, if any.
pub fn get() -> Option<&'static Arc<GameLoop>> {
    GLOBAL.get()
}
