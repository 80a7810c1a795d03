use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use settle_api::Message;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  GET / and GET /health
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_root() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "service": "settle",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /messages",
            "POST /slack/events",
            "GET /batch-status?channel_id=",
            "POST /force-process-batch?channel_id=",
            "GET /health",
        ],
    }))
}

pub(crate) async fn handle_health() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "healthy" }))
}

// ═══════════════════════════════════════════════════════════════
//  POST /messages
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct IngestRequest {
    channel_id: String,
    sender: String,
    content: String,
    #[serde(default)]
    link: String,
}

pub(crate) async fn handle_ingest(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<IngestRequest>,
) -> impl IntoResponse {
    if req.channel_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "ok": false, "error": "channel_id must not be empty" })),
        )
            .into_response();
    }

    tracing::debug!(channel = %req.channel_id, sender = %req.sender, "message received");
    state
        .control
        .ingest(&req.channel_id, Message::new(req.sender, req.content, req.link));

    (
        StatusCode::ACCEPTED,
        axum::Json(serde_json::json!({
            "ok": true,
            "channel_id": req.channel_id,
            "message": "message added to batch",
        })),
    )
        .into_response()
}

// ═══════════════════════════════════════════════════════════════
//  GET /batch-status?channel_id=X
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct StatusParams {
    channel_id: Option<String>,
}

pub(crate) async fn handle_batch_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> impl IntoResponse {
    let channel = params.channel_id.as_deref().filter(|c| !c.is_empty());
    axum::Json(state.control.status(channel))
}

// ═══════════════════════════════════════════════════════════════
//  POST /force-process-batch?channel_id=X
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct ForceParams {
    channel_id: String,
}

pub(crate) async fn handle_force_flush(
    State(state): State<AppState>,
    Query(params): Query<ForceParams>,
) -> impl IntoResponse {
    let outcome = state.control.force_flush(&params.channel_id).await;
    axum::Json(outcome)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testing::{app, send};

    #[tokio::test]
    async fn health_reports_healthy() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "settle");
        assert!(body["endpoints"].as_array().unwrap().len() >= 4);
    }

    #[tokio::test]
    async fn ingest_hands_message_to_engine() {
        let (app, control) = app();
        let payload = json!({
            "channel_id": "C1",
            "sender": "U1",
            "content": "deploy is green",
            "link": "https://acme.slack.com/archives/C1/p1",
        });

        let (status, body) = send(app, "POST", "/messages", Some(payload.to_string())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["ok"], true);

        let ingested = control.ingested.lock().unwrap();
        assert_eq!(ingested.len(), 1);
        assert_eq!(ingested[0].0, "C1");
        assert_eq!(ingested[0].1.sender, "U1");
        assert_eq!(ingested[0].1.content, "deploy is green");
    }

    #[tokio::test]
    async fn ingest_rejects_blank_channel() {
        let (app, control) = app();
        let payload = json!({ "channel_id": " ", "sender": "U1", "content": "hi" });

        let (status, body) = send(app, "POST", "/messages", Some(payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert!(control.ingested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_rejects_malformed_body() {
        let (app, control) = app();
        let (status, _) = send(app, "POST", "/messages", Some("{\"sender\":1}".into())).await;
        assert!(status.is_client_error());
        assert!(control.ingested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_for_unknown_channel_is_no_batch() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/batch-status?channel_id=C9", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_channels"], 0);
        assert_eq!(body["channels"]["C9"]["status"], "no_batch");
    }

    #[tokio::test]
    async fn status_without_channel_lists_all_active() {
        let (app, control) = app();
        {
            use settle_api::BatchControl;
            control.ingest("C1", settle_api::Message::new("U1", "a", ""));
            control.ingest("C1", settle_api::Message::new("U2", "b", ""));
            control.ingest("C2", settle_api::Message::new("U3", "c", ""));
        }

        let (_, body) = send(app, "GET", "/batch-status", None).await;
        assert_eq!(body["active_channels"], 2);
        assert_eq!(body["channels"]["C1"]["status"], "active");
        assert_eq!(body["channels"]["C1"]["message_count"], 2);
        assert_eq!(body["channels"]["C2"]["message_count"], 1);
    }

    #[tokio::test]
    async fn force_flush_reports_outcome() {
        let (app, control) = app();
        {
            use settle_api::BatchControl;
            control.ingest("C1", settle_api::Message::new("U1", "a", ""));
        }

        let (status, body) =
            send(app.clone(), "POST", "/force-process-batch?channel_id=C1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["report"]["attempted"], 1);

        let (status, body) = send(app, "POST", "/force-process-batch?channel_id=C1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body.get("report").is_none());
    }

    #[tokio::test]
    async fn force_flush_requires_channel_id() {
        let (app, _) = app();
        let (status, _) = send(app, "POST", "/force-process-batch", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
