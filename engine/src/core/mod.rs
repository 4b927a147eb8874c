pub mod config;
pub mod context;
pub mod error;
pub mod fault;
pub mod frame;
pub mod game_loop;
pub mod global;
pub mod invoke;
pub mod log;
pub mod observer;
pub mod phase;
pub mod quit;
pub mod registry;
mod roster;
pub mod runner;
pub mod thread;
pub mod time;

pub use config::Config;
pub use context::Context;
pub use error::{LoopError, RegistryCorruption, ThreadViolation};
pub use fault::{ChannelSink, EntryFault, FaultOrigin, FaultSink, LogSink, RecordingSink};
pub use frame::{FrameDriver, FrameReport, StopHandle};
pub use game_loop::{Builder, GameLoop, TICK_ID_MASK};
pub use invoke::{InvokeQueue, Job};
pub use observer::{PhaseEvent, QuitEvent, Subscription, Topic};
pub use phase::{Phase, Stage, TickKind};
pub use quit::{NoopTerminate, QuitOutcome, QuitState, Terminate};
pub use registry::{UpdateRegistry, Updatable, from_fn};
pub use runner::RunResult;
pub use thread::{LoopThread, Owner};
