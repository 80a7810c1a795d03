mod http;
mod slack;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use settle_api::BatchControl;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bind api :{port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("axum serve: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) control: Arc<dyn BatchControl>,
    /// Base URL for Slack message permalinks.
    pub(crate) archive_base_url: Arc<str>,
}

/// Build the HTTP router over a batching engine.
pub fn router(control: Arc<dyn BatchControl>, archive_base_url: &str) -> Router {
    let state = AppState {
        control,
        archive_base_url: Arc::from(archive_base_url),
    };

    Router::new()
        .route("/", get(http::handle_root))
        .route("/health", get(http::handle_health))
        .route("/messages", post(http::handle_ingest))
        .route("/slack/events", post(slack::handle_slack_events))
        .route("/batch-status", get(http::handle_batch_status))
        .route("/force-process-batch", post(http::handle_force_flush))
        .with_state(state)
}

/// Serve the HTTP API until `shutdown` is cancelled.
pub async fn run(
    port: u16,
    control: Arc<dyn BatchControl>,
    archive_base_url: &str,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let app = router(control, archive_base_url);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| ApiError::Bind { port, source })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ApiError::Serve)?;

    Ok(())
}
