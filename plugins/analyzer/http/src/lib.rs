//! Analyzer backed by a remote HTTP service.
//!
//! Each flushed message becomes one `POST {url}` with a JSON body
//! `{"sender": .., "link": .., "text": ..}`. Any 2xx answer is success.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use settle_api::{AnalyzeError, Analyzer};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    sender: &'a str,
    link: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalyzer {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AnalyzeError::transport(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Analyzer for HttpAnalyzer {
    fn analyze<'a>(
        &'a self,
        sender: &'a str,
        link: &'a str,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalyzeError>> + Send + 'a>> {
        Box::pin(async move {
            let body = AnalyzeRequest {
                sender,
                link,
                text: content,
            };
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| AnalyzeError::transport(format!("POST {}: {e}", self.url)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            tracing::debug!(url = %self.url, status = status.as_u16(), "analysis service rejected request");
            Err(AnalyzeError::Status {
                status: status.as_u16(),
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;

    type Seen = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn record(
        State(seen): State<Seen>,
        axum::Json(body): axum::Json<serde_json::Value>,
    ) -> StatusCode {
        seen.lock().unwrap().push(body);
        StatusCode::OK
    }

    async fn busy() -> (StatusCode, String) {
        (StatusCode::SERVICE_UNAVAILABLE, "x".repeat(2000))
    }

    async fn serve() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/analyze", post(record))
            .route("/busy", post(busy))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn posts_message_as_json() {
        let (base, seen) = serve().await;
        let analyzer = HttpAnalyzer::new(format!("{base}/analyze"), Duration::from_secs(5)).unwrap();

        analyzer
            .analyze("U1", "https://acme.slack.com/archives/C1/p1", "ship it")
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![serde_json::json!({
                "sender": "U1",
                "link": "https://acme.slack.com/archives/C1/p1",
                "text": "ship it",
            })]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_truncated_body() {
        let (base, _seen) = serve().await;
        let analyzer = HttpAnalyzer::new(format!("{base}/busy"), Duration::from_secs(5)).unwrap();

        match analyzer.analyze("U1", "", "hi").await {
            Err(AnalyzeError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let analyzer =
            HttpAnalyzer::new(format!("http://{addr}/analyze"), Duration::from_secs(2)).unwrap();
        let err = analyzer.analyze("U1", "", "hi").await.unwrap_err();
        assert!(matches!(err, AnalyzeError::Transport(_)));
    }
}
