use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Point-in-time view of one channel's active batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub message_count: usize,
    /// When the first message of this batch arrived (Unix ms).
    pub created_at_ms: i64,
    /// Quiet period this batch was created with.
    pub timeout_secs: u64,
    /// Seconds since the batch was created.
    pub elapsed_secs: f64,
    /// A previous batch of the same channel is still being analyzed.
    pub draining: bool,
}

/// Per-channel status as reported by the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelStatus {
    Active(BatchStatus),
    NoBatch,
}

impl ChannelStatus {
    pub fn message_count(&self) -> usize {
        match self {
            ChannelStatus::Active(s) => s.message_count,
            ChannelStatus::NoBatch => 0,
        }
    }
}

/// Answer to the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStatus {
    /// Channels currently holding an active batch (not affected by the filter).
    pub active_channels: usize,
    /// Process-wide debounce timeout applied to new batches.
    pub batch_timeout_seconds: u64,
    pub channels: BTreeMap<String, ChannelStatus>,
}

/// What a flush did with one detached batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub channel_id: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of a force-flush request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushOutcome {
    /// `true` when a batch existed and was processed.
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<FlushReport>,
}

impl FlushOutcome {
    pub fn processed(report: FlushReport) -> Self {
        Self {
            success: true,
            message: format!(
                "batch for channel {} processed ({} of {} messages analyzed)",
                report.channel_id, report.succeeded, report.attempted
            ),
            report: Some(report),
        }
    }

    pub fn nothing_to_flush(channel_id: &str) -> Self {
        Self {
            success: false,
            message: format!("no active batch for channel {channel_id}"),
            report: None,
        }
    }
}
