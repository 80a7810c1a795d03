//! Slack Events API ingestion.
//!
//! Slack retries deliveries that do not get a timely 2xx, so every envelope
//! is answered with `200 {"ok": true, ...}`, including ones that are ignored
//! or cannot be parsed.

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use settle_api::Message;
use settle_api::util::archive_link;

use super::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct SlackEnvelope {
    #[serde(rename = "type", default)]
    kind: String,
    challenge: Option<String>,
    event: Option<SlackEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackEvent {
    #[serde(rename = "type", default)]
    kind: String,
    subtype: Option<String>,
    channel: Option<String>,
    user: Option<String>,
    text: Option<String>,
    ts: Option<String>,
    bot_id: Option<String>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum SlackAction {
    /// URL verification handshake: echo the challenge back.
    Challenge(String),
    Ignore(&'static str),
    Ingest { channel_id: String, message: Message },
}

/// Decide what to do with one Events API envelope.
pub(crate) fn classify(envelope: SlackEnvelope, archive_base_url: &str) -> SlackAction {
    if let Some(challenge) = envelope.challenge {
        return SlackAction::Challenge(challenge);
    }
    if envelope.kind != "event_callback" {
        return SlackAction::Ignore("unsupported envelope type");
    }
    let Some(event) = envelope.event else {
        return SlackAction::Ignore("envelope without event");
    };
    if event.kind != "message" {
        return SlackAction::Ignore("not a message event");
    }
    if event.subtype.as_deref() == Some("message_deleted") {
        return SlackAction::Ignore("message deleted");
    }
    if event.bot_id.is_some() {
        return SlackAction::Ignore("bot message");
    }
    let (Some(channel_id), Some(text)) = (event.channel, event.text) else {
        return SlackAction::Ignore("message without channel or text");
    };

    let ts = event.ts.unwrap_or_default();
    let link = archive_link(archive_base_url, &channel_id, &ts);
    let sender = event.user.unwrap_or_else(|| "unknown".to_string());
    SlackAction::Ingest {
        message: Message::new(sender, text, link),
        channel_id,
    }
}

// ═══════════════════════════════════════════════════════════════
//  POST /slack/events
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_slack_events(
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    let envelope: SlackEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable slack envelope");
            return axum::Json(serde_json::json!({ "ok": true, "error": "invalid JSON" }));
        }
    };

    match classify(envelope, &state.archive_base_url) {
        SlackAction::Challenge(challenge) => {
            tracing::info!("slack url verification");
            axum::Json(serde_json::json!({ "challenge": challenge }))
        }
        SlackAction::Ignore(reason) => {
            tracing::debug!(reason, "slack event ignored");
            axum::Json(serde_json::json!({ "ok": true, "ignored": reason }))
        }
        SlackAction::Ingest {
            channel_id,
            message,
        } => {
            tracing::debug!(channel = %channel_id, sender = %message.sender, "slack message received");
            state.control.ingest(&channel_id, message);
            axum::Json(serde_json::json!({ "ok": true, "channel_id": channel_id }))
        }
    }
}
