//! Terminal dashboard for a running game loop.
//!
//! The dashboard shows tick counters, the current phase and quit state, renders log records
//! forwarded by a [`ChannelLogger`](rusty_loop::core::log::ChannelLogger) and faults forwarded
//! by a [`ChannelSink`](rusty_loop::core::ChannelSink), and takes typed commands that are
//! posted to the loop thread.

pub mod command;
pub mod dashboard;

pub use command::{Command, Controls};
pub use dashboard::Dashboard;
