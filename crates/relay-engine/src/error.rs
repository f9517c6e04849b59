#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("SSE session not found for sessionId: {0}")]
    SessionNotFound(String),

    #[error("poll chain already active for sessionId: {session_id} (trackingId: {tracking_id})")]
    ChainAlreadyActive {
        session_id: String,
        tracking_id: String,
    },

    #[error("http client error: {0}")]
    HttpClient(String),
}
