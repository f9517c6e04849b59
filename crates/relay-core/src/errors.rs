use std::time::Duration;

/// Failure of a call to the external inquiry API.
///
/// Every variant is terminal for the chain that made the call: the poll loop
/// never retries a failed call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExternalCallError {
    /// The API answered with a non-2xx status.
    #[error("{status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("invalid response body: {0}")]
    Body(String),
}

impl ExternalCallError {
    pub fn from_status(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Whether the remote side produced an error response (4xx/5xx), as
    /// opposed to the call never completing.
    pub fn is_response_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..600).contains(status))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Status { status, .. } if *status >= 500 => "server_error",
            Self::Status { .. } => "client_error",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Body(_) => "invalid_body",
        }
    }
}
