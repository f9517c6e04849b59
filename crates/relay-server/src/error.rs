use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_engine::EngineError;

/// Error returned by a handler. Rendered as a plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::SessionNotFound(_) => Self::bad_request(e.to_string()),
            EngineError::ChainAlreadyActive { .. } => Self::conflict(e.to_string()),
            EngineError::HttpClient(_) => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_status() {
        let missing = ApiError::from(EngineError::SessionNotFound("abc".into()));
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.message, "SSE session not found for sessionId: abc");

        let busy = ApiError::from(EngineError::ChainAlreadyActive {
            session_id: "abc".into(),
            tracking_id: "T-1".into(),
        });
        assert_eq!(busy.status, StatusCode::CONFLICT);
    }
}
