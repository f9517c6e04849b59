use serde::{Deserialize, Serialize};

use crate::ids::TrackingId;

/// Outcome kinds delivered to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Ack,
    InProgress,
    Completed,
    Failed,
    Rejected,
    Timeout,
    Error,
}

impl EventKind {
    /// Terminal kinds end a chain: nothing is produced after them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Rejected | Self::Timeout | Self::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single status event pushed to a session's channel.
///
/// Serialized on the wire as `{"status": KIND, "message": ..., "trackingId": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    #[serde(rename = "status")]
    pub kind: EventKind,
    pub message: String,
    pub tracking_id: TrackingId,
}

impl DomainEvent {
    pub fn new(kind: EventKind, message: impl Into<String>, tracking_id: TrackingId) -> Self {
        Self {
            kind,
            message: message.into(),
            tracking_id,
        }
    }

    pub fn ack(tracking_id: TrackingId) -> Self {
        Self::new(EventKind::Ack, "Process started", tracking_id)
    }

    pub fn timeout(tracking_id: TrackingId) -> Self {
        Self::new(EventKind::Timeout, "Polling limit reached", tracking_id)
    }

    pub fn error(message: impl Into<String>, tracking_id: TrackingId) -> Self {
        Self::new(EventKind::Error, message, tracking_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_kinds() {
        for kind in [
            EventKind::Completed,
            EventKind::Failed,
            EventKind::Rejected,
            EventKind::Timeout,
            EventKind::Error,
        ] {
            assert!(kind.is_terminal(), "{kind} should be terminal");
        }
        assert!(!EventKind::Ack.is_terminal());
        assert!(!EventKind::InProgress.is_terminal());
    }

    #[test]
    fn wire_shape() {
        let event = DomainEvent::ack(TrackingId::from_raw("T-1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "ACK",
                "message": "Process started",
                "trackingId": "T-1"
            })
        );
    }

    #[test]
    fn in_progress_kind_serializes_with_underscore() {
        let json = serde_json::to_string(&EventKind::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        assert_eq!(EventKind::InProgress.as_str(), "IN_PROGRESS");
    }

    #[test]
    fn timeout_event_message() {
        let event = DomainEvent::timeout(TrackingId::from_raw("T-9"));
        assert_eq!(event.kind, EventKind::Timeout);
        assert_eq!(event.message, "Polling limit reached");
        assert!(event.is_terminal());
    }
}
