use serde::{Deserialize, Serialize};

use crate::util::now_ms;

/// A single chat message waiting in a channel batch.
///
/// Immutable once created: the registry owns it until a flush hands it to the
/// analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message (user id, display name, ...).
    pub sender: String,
    /// Message text.
    pub content: String,
    /// Link back to the message in its origin system.
    pub link: String,
    /// Arrival time in Unix milliseconds.
    pub received_at_ms: i64,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(
        sender: impl Into<String>,
        content: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            link: link.into(),
            received_at_ms: now_ms(),
        }
    }
}
