use std::time::Duration;

use tokio::time::Instant;

use settle_api::{BatchStatus, Message, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Accepting messages; debounce timer armed.
    Active,
    /// Detached from the registry and handed to the flush processor.
    Flushing,
}

/// Messages accumulated for one channel since its last flush.
///
/// Never empty: a record is created with its first message and leaves the
/// registry as a whole.
#[derive(Debug)]
pub struct BatchRecord {
    channel_id: String,
    messages: Vec<Message>,
    created_at_ms: i64,
    created_at: Instant,
    timeout: Duration,
    state: BatchState,
}

impl BatchRecord {
    pub fn new(channel_id: impl Into<String>, first: Message, timeout: Duration) -> Self {
        Self {
            channel_id: channel_id.into(),
            messages: vec![first],
            created_at_ms: now_ms(),
            created_at: Instant::now(),
            timeout,
            state: BatchState::Active,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        debug_assert_eq!(self.state, BatchState::Active);
        self.messages.push(message);
    }

    pub(crate) fn mark_flushing(&mut self) {
        self.state = BatchState::Flushing;
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn snapshot(&self, draining: bool) -> BatchStatus {
        BatchStatus {
            message_count: self.messages.len(),
            created_at_ms: self.created_at_ms,
            timeout_secs: self.timeout.as_secs(),
            elapsed_secs: self.created_at.elapsed().as_secs_f64(),
            draining,
        }
    }
}
