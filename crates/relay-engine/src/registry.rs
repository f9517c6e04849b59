use dashmap::DashMap;
use relay_core::events::DomainEvent;
use relay_core::ids::SessionId;
use tracing::{debug, warn};

use crate::channel::{ChannelId, EventChannel};

/// Concurrent map from session id to its event channel.
///
/// All operations are safe to call from any task without external locking.
/// A session id maps to at most one channel at a time.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, EventChannel>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh channel for `session_id`.
    ///
    /// An existing channel for the same id is replaced and orphaned: its
    /// consumer can still drain it, but producers no longer reach it.
    pub fn register(&self, session_id: &SessionId) -> EventChannel {
        let channel = EventChannel::new(session_id.clone());
        self.install(channel.clone());
        channel
    }

    /// Install an existing channel under its own session id, with the same
    /// replacement semantics as [`register`](Self::register).
    pub fn install(&self, channel: EventChannel) {
        let session_id = channel.session_id().clone();
        let id = channel.id();
        if let Some(previous) = self.sessions.insert(session_id.clone(), channel) {
            warn!(
                session_id = %session_id,
                previous_channel = %previous.id(),
                channel = %id,
                "Session re-registered while a channel was still attached"
            );
        }
    }

    pub fn lookup(&self, session_id: &SessionId) -> Option<EventChannel> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Detach and return the session's channel.
    pub fn remove(&self, session_id: &SessionId) -> Option<EventChannel> {
        self.sessions.remove(session_id).map(|(_, channel)| channel)
    }

    /// Remove the entry only if it still holds the channel `channel_id`.
    pub fn remove_if_current(
        &self,
        session_id: &SessionId,
        channel_id: ChannelId,
    ) -> Option<EventChannel> {
        self.sessions
            .remove_if(session_id, |_, channel| channel.id() == channel_id)
            .map(|(_, channel)| channel)
    }

    /// Push to the session's current channel. Absent sessions are a no-op.
    pub fn push(&self, session_id: &SessionId, event: DomainEvent) -> bool {
        match self.lookup(session_id) {
            Some(channel) => channel.push(event),
            None => {
                debug!(session_id = %session_id, kind = %event.kind, "No channel for session, dropping event");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
