use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use relay_core::events::DomainEvent;
use relay_core::ids::SessionId;
use relay_core::request::StartRequest;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// Raw start body. Missing fields are reported by validation instead of
/// failing deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    #[serde(default)]
    pub tracking_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl StartBody {
    pub fn into_request(self) -> Result<StartRequest, ApiError> {
        let request = StartRequest::new(
            self.tracking_id.unwrap_or_default(),
            self.user_id.unwrap_or_default(),
        );
        request.validate().map_err(ApiError::bad_request)?;
        Ok(request)
    }
}

/// `GET /sse/connect/{session_id}`
pub async fn connect(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = SessionId::from_raw(session_id);
    let stream = state.orchestrator.connect(&session_id);

    let frames = stream.map(|event| Ok(to_frame(&event)));
    let keep_alive = KeepAlive::new().interval(state.keep_alive);
    Sse::new(frames).keep_alive(keep_alive)
}

fn to_frame(event: &DomainEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to encode event");
        Event::default().data("{}")
    })
}

/// `POST /sse/start/{session_id}`
pub async fn start(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Result<Json<StartBody>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = body.into_request()?;
    let session_id = SessionId::from_raw(session_id);

    info!(session_id = %session_id, tracking_id = %request.tracking_id, "Start requested");
    state.orchestrator.start(&session_id, request)?;
    Ok("ACK Received")
}

/// `DELETE /sse/disconnect/{session_id}`
pub async fn disconnect(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    let session_id = SessionId::from_raw(session_id);
    if !state.orchestrator.disconnect(&session_id) {
        info!(session_id = %session_id, "Disconnect for unknown session");
    }
    StatusCode::OK
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.orchestrator.registry().len(),
        "activeChains": state.orchestrator.active_chain_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_with_both_fields_validates() {
        let body: StartBody =
            serde_json::from_str(r#"{"trackingId": "T-1", "userId": "u"}"#).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.tracking_id.as_str(), "T-1");
    }

    #[test]
    fn missing_fields_report_required_message() {
        let body: StartBody = serde_json::from_str(r#"{"userId": "u"}"#).unwrap();
        assert_eq!(body.into_request().unwrap_err().message, "trackingId is required");

        let body: StartBody = serde_json::from_str(r#"{"trackingId": "T-1"}"#).unwrap();
        assert_eq!(body.into_request().unwrap_err().message, "userId is required");
    }
}
