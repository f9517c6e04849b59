//! Raw status text → domain outcome.
//!
//! Keywords are checked in a fixed order: `COMPLETED`, then `FAILED`, then
//! `REJECTED`. The first match wins, so a text mentioning several keywords
//! resolves to the earliest one in that list. Anything else is `IN_PROGRESS`
//! with the raw text carried through verbatim.

use crate::events::{DomainEvent, EventKind};
use crate::ids::TrackingId;

const KEYWORDS: [(&str, EventKind, &str); 3] = [
    ("COMPLETED", EventKind::Completed, "Process completed"),
    ("FAILED", EventKind::Failed, "Process failed"),
    ("REJECTED", EventKind::Rejected, "Process rejected"),
];

/// Classify a status response body into the event pushed to the subscriber.
pub fn classify(raw: &str, tracking_id: TrackingId) -> DomainEvent {
    match KEYWORDS.iter().find(|(keyword, _, _)| raw.contains(keyword)) {
        Some((_, kind, message)) => DomainEvent::new(*kind, *message, tracking_id),
        None => DomainEvent::new(EventKind::InProgress, raw, tracking_id),
    }
}
