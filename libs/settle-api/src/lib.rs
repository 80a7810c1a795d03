pub mod analyzer;
pub mod control;
pub mod error;
pub mod message;
pub mod status;
pub mod util;

pub use analyzer::Analyzer;
pub use control::BatchControl;
pub use error::AnalyzeError;
pub use message::Message;
pub use status::{BatchStatus, ChannelStatus, FlushOutcome, FlushReport, RegistryStatus};
pub use util::now_ms;
