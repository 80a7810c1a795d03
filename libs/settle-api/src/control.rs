use std::future::Future;
use std::pin::Pin;

use crate::message::Message;
use crate::status::{FlushOutcome, RegistryStatus};

/// What the outer surfaces (HTTP API, tests) need from the batching engine.
pub trait BatchControl: Send + Sync {
    /// Append a message to its channel batch. Never fails.
    fn ingest(&self, channel_id: &str, message: Message);

    /// Snapshot of one channel (`Some`) or of every active channel (`None`).
    fn status(&self, channel_id: Option<&str>) -> RegistryStatus;

    /// Flush a channel immediately, bypassing its debounce timer.
    fn force_flush<'a>(
        &'a self,
        channel_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = FlushOutcome> + Send + 'a>>;
}
