use std::time::Duration;

use async_trait::async_trait;
use relay_core::errors::ExternalCallError;
use relay_core::ids::TrackingId;
use relay_core::request::StartRequest;
use reqwest::Client;
use tracing::debug;

use crate::error::EngineError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The external inquiry API. Only success/failure and the response text are
/// consumed; the body format is opaque.
#[async_trait]
pub trait InquiryClient: Send + Sync {
    /// Kick off the external process. Returns the acknowledgement body.
    async fn start(&self, request: &StartRequest) -> Result<String, ExternalCallError>;

    /// Fetch the raw status text for poll attempt `attempt` (0-based).
    async fn status(
        &self,
        tracking_id: &TrackingId,
        attempt: usize,
    ) -> Result<String, ExternalCallError>;
}

#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub start_path: String,
    /// `{attempt}` becomes the 1-based attempt number, `{trackingId}` the
    /// tracking id.
    pub status_path: String,
    pub request_timeout: Duration,
}

/// `InquiryClient` over HTTP: POST JSON to start, GET to poll.
pub struct HttpInquiryClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpInquiryClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn start_url(&self) -> String {
        join_url(&self.config.base_url, &self.config.start_path)
    }

    pub fn status_url(&self, tracking_id: &TrackingId, attempt: usize) -> String {
        let path = render_status_path(&self.config.status_path, tracking_id, attempt);
        join_url(&self.config.base_url, &path)
    }

    fn map_error(&self, e: reqwest::Error) -> ExternalCallError {
        if e.is_timeout() {
            ExternalCallError::Timeout(self.config.request_timeout)
        } else if e.is_decode() || e.is_body() {
            ExternalCallError::Body(e.to_string())
        } else {
            ExternalCallError::Network(e.to_string())
        }
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<String, ExternalCallError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        if !status.is_success() {
            return Err(ExternalCallError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                body,
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl InquiryClient for HttpInquiryClient {
    async fn start(&self, request: &StartRequest) -> Result<String, ExternalCallError> {
        let url = self.start_url();
        debug!(url = %url, tracking_id = %request.tracking_id, "Calling start API");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.read_body(response).await
    }

    async fn status(
        &self,
        tracking_id: &TrackingId,
        attempt: usize,
    ) -> Result<String, ExternalCallError> {
        let url = self.status_url(tracking_id, attempt);
        debug!(url = %url, tracking_id = %tracking_id, attempt, "Calling status API");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        self.read_body(response).await
    }
}

/// Substitute placeholders in a status path template.
pub fn render_status_path(template: &str, tracking_id: &TrackingId, attempt: usize) -> String {
    template
        .replace("{attempt}", &(attempt + 1).to_string())
        .replace("{trackingId}", tracking_id.as_str())
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    fn config(base_url: String) -> HttpClientConfig {
        HttpClientConfig {
            base_url,
            start_path: "/start".into(),
            status_path: "/status/{trackingId}/{attempt}".into(),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn spawn_api() -> String {
        let app = Router::new()
            .route(
                "/start",
                post(|Json(body): Json<serde_json::Value>| async move {
                    format!("started {}", body["trackingId"].as_str().unwrap_or(""))
                }),
            )
            .route(
                "/status/{tracking}/{attempt}",
                get(|Path((tracking, attempt)): Path<(String, u32)>| async move {
                    if tracking == "broken" {
                        (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())
                    } else if attempt >= 2 {
                        (StatusCode::OK, "COMPLETED".to_string())
                    } else {
                        (StatusCode::OK, format!("working on attempt {attempt}"))
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    #[test]
    fn renders_placeholders() {
        let tid = TrackingId::from_raw("T-7");
        assert_eq!(render_status_path("/todos/{attempt}", &tid, 0), "/todos/1");
        assert_eq!(
            render_status_path("/inquiries/{trackingId}?n={attempt}", &tid, 4),
            "/inquiries/T-7?n=5"
        );
        assert_eq!(render_status_path("/fixed", &tid, 3), "/fixed");
    }

    #[test]
    fn joins_urls() {
        assert_eq!(join_url("http://h/", "/a"), "http://h/a");
        assert_eq!(join_url("http://h", "a"), "http://h/a");
        assert_eq!(join_url("http://h/", ""), "http://h");
    }

    #[tokio::test]
    async fn start_posts_request_body() {
        let base = spawn_api().await;
        let client = HttpInquiryClient::new(config(base)).unwrap();

        let ack = client.start(&StartRequest::new("T-1", "u-1")).await.unwrap();
        assert_eq!(ack, "started T-1");
    }

    #[tokio::test]
    async fn status_uses_one_based_attempt() {
        let base = spawn_api().await;
        let client = HttpInquiryClient::new(config(base)).unwrap();
        let tid = TrackingId::from_raw("T-1");

        assert_eq!(client.status(&tid, 0).await.unwrap(), "working on attempt 1");
        assert_eq!(client.status(&tid, 1).await.unwrap(), "COMPLETED");
    }

    #[tokio::test]
    async fn error_status_is_response_error() {
        let base = spawn_api().await;
        let client = HttpInquiryClient::new(config(base)).unwrap();

        let err = client
            .status(&TrackingId::from_raw("broken"), 0)
            .await
            .unwrap_err();
        assert!(err.is_response_error());
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpInquiryClient::new(config(format!("http://{addr}"))).unwrap();
        let err = client.start(&StartRequest::new("T-1", "u-1")).await.unwrap_err();
        assert!(!err.is_response_error());
        assert_eq!(err.error_kind(), "network_error");
    }
}
