//! Per-channel debounce timer.
//!
//! A timer is a sleeping tokio task. When it wakes it only *reports* the
//! firing; the registry decides whether the firing is still current by
//! comparing generations, so a timer that is aborted too late cannot flush.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Emitted when a debounce timer expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub channel_id: String,
    /// Generation of the batch the timer was armed for.
    pub generation: u64,
}

#[derive(Debug)]
pub struct DebounceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl DebounceTimer {
    /// Spawn a timer reporting to `fired_tx` after `timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(
        channel_id: String,
        generation: u64,
        timeout: Duration,
        fired_tx: mpsc::UnboundedSender<TimerFired>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // Receiver is gone only during shutdown.
            let _ = fired_tx.send(TimerFired {
                channel_id,
                generation,
            });
        });
        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the countdown. No-op if the timer already fired.
    pub fn cancel(self) {
        self.handle.abort();
    }
}
