pub mod config;
pub mod engine;
pub mod error;
pub mod flush;
pub mod record;
pub mod registry;
pub mod timer;

pub use engine::{Engine, EngineHandle};
pub use error::EngineError;
pub use flush::FlushProcessor;
pub use record::{BatchRecord, BatchState};
pub use registry::{BatchRegistry, FlushLease, FlushTrigger};
pub use timer::{DebounceTimer, TimerFired};
