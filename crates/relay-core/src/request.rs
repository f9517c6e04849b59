use serde::{Deserialize, Serialize};

use crate::ids::{TrackingId, UserId};

/// Body of a start request, forwarded verbatim to the external start endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub tracking_id: TrackingId,
    pub user_id: UserId,
}

impl StartRequest {
    pub fn new(tracking_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tracking_id: TrackingId::from_raw(tracking_id),
            user_id: UserId::from_raw(user_id),
        }
    }

    /// Check required fields, returning the first violation message.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.tracking_id.is_blank() {
            return Err("trackingId is required");
        }
        if self.user_id.is_blank() {
            return Err("userId is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_body() {
        let req: StartRequest =
            serde_json::from_str(r#"{"trackingId": "T-1", "userId": "u-9"}"#).unwrap();
        assert_eq!(req.tracking_id.as_str(), "T-1");
        assert_eq!(req.user_id.as_str(), "u-9");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(StartRequest::new(" ", "u").validate(), Err("trackingId is required"));
        assert_eq!(StartRequest::new("T-1", "").validate(), Err("userId is required"));
    }

    #[test]
    fn serializes_for_forwarding() {
        let json = serde_json::to_value(StartRequest::new("T-1", "u-9")).unwrap();
        assert_eq!(json, serde_json::json!({"trackingId": "T-1", "userId": "u-9"}));
    }
}
