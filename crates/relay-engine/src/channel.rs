//! Per-session event channel.
//!
//! Any number of producers push [`DomainEvent`]s; a single [`EventStream`]
//! drains them in push order. Pushing never blocks: events are buffered until
//! the consumer reads them. Once the channel is completed, or its consumer is
//! gone, pushes are silently dropped.
//!
//! If the consumer goes away before `complete()` (client dropped the
//! connection), the detach hook runs exactly once with the channel's id.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use relay_core::events::DomainEvent;
use relay_core::ids::SessionId;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique channel identity. Distinguishes a session's current channel
/// from an orphaned predecessor registered under the same session id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch_{}", self.0)
    }
}

/// Callback fired when the consumer detaches before completion.
pub type DetachHook = Box<dyn FnOnce(ChannelId) + Send + 'static>;

struct Shared {
    id: ChannelId,
    session_id: SessionId,
    tx: Mutex<Option<mpsc::UnboundedSender<DomainEvent>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<DomainEvent>>>,
    completed: AtomicBool,
    on_detach: Mutex<Option<DetachHook>>,
}

/// Producer-side handle. Cheap to clone; all clones refer to the same buffer.
#[derive(Clone)]
pub struct EventChannel {
    shared: Arc<Shared>,
}

impl EventChannel {
    /// A channel whose consumer side is taken later with [`subscribe`](Self::subscribe).
    pub fn new(session_id: SessionId) -> Self {
        let (channel, rx) = Self::unsubscribed(session_id);
        *channel.shared.rx.lock() = Some(rx);
        channel
    }

    /// A channel together with its consumer stream.
    pub fn open(session_id: SessionId) -> (Self, EventStream) {
        let (channel, rx) = Self::unsubscribed(session_id);
        let stream = channel.stream_from(rx);
        (channel, stream)
    }

    fn unsubscribed(session_id: SessionId) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            shared: Arc::new(Shared {
                id: ChannelId::next(),
                session_id,
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(None),
                completed: AtomicBool::new(false),
                on_detach: Mutex::new(None),
            }),
        };
        (channel, rx)
    }

    fn stream_from(&self, rx: mpsc::UnboundedReceiver<DomainEvent>) -> EventStream {
        EventStream {
            events: UnboundedReceiverStream::new(rx),
            shared: Arc::clone(&self.shared),
            finished: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.shared.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Buffer an event for the consumer. Returns `false` when the event was
    /// dropped because the channel is closed.
    pub fn push(&self, event: DomainEvent) -> bool {
        match self.shared.tx.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Signal end-of-stream. The consumer still receives everything pushed
    /// before this call. Idempotent.
    pub fn complete(&self) {
        self.shared.completed.store(true, Ordering::SeqCst);
        self.shared.tx.lock().take();
        self.shared.on_detach.lock().take();
    }

    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::SeqCst)
    }

    /// True once pushes can no longer reach a consumer.
    pub fn is_closed(&self) -> bool {
        self.shared
            .tx
            .lock()
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }

    /// Install the hook run when the consumer detaches early. Replaces any
    /// previous hook.
    pub fn on_detach<F>(&self, hook: F)
    where
        F: FnOnce(ChannelId) + Send + 'static,
    {
        *self.shared.on_detach.lock() = Some(Box::new(hook));
    }

    /// Take the consumer side. Only the first call succeeds.
    pub fn subscribe(&self) -> Option<EventStream> {
        let rx = self.shared.rx.lock().take()?;
        Some(self.stream_from(rx))
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("id", &self.shared.id)
            .field("session_id", &self.shared.session_id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Consumer side of an [`EventChannel`].
pub struct EventStream {
    events: UnboundedReceiverStream<DomainEvent>,
    shared: Arc<Shared>,
    finished: bool,
}

impl EventStream {
    pub fn channel_id(&self) -> ChannelId {
        self.shared.id
    }
}

impl Stream for EventStream {
    type Item = DomainEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.events).poll_next(cx);
        if let Poll::Ready(None) = polled {
            self.finished = true;
        }
        polled
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.finished || self.shared.completed.load(Ordering::SeqCst) {
            return;
        }
        // Hook first: it unroutes the channel while the buffer is still live.
        let hook = self.shared.on_detach.lock().take();
        if let Some(hook) = hook {
            hook(self.shared.id);
        }
        self.shared.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use relay_core::events::EventKind;
    use relay_core::ids::TrackingId;
    use std::sync::atomic::AtomicUsize;

    fn event(kind: EventKind, message: &str) -> DomainEvent {
        DomainEvent::new(kind, message, TrackingId::from_raw("T-1"))
    }

    #[tokio::test]
    async fn delivers_in_push_order() {
        let channel = EventChannel::new(SessionId::new());
        let mut stream = channel.subscribe().unwrap();

        assert!(channel.push(event(EventKind::Ack, "a")));
        assert!(channel.push(event(EventKind::InProgress, "b")));
        assert!(channel.push(event(EventKind::Completed, "c")));
        channel.complete();

        let messages: Vec<String> = stream.by_ref().map(|e| e.message).collect().await;
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn buffers_before_subscription() {
        let channel = EventChannel::new(SessionId::new());
        channel.push(event(EventKind::Ack, "early"));

        let mut stream = channel.subscribe().unwrap();
        assert_eq!(stream.next().await.unwrap().message, "early");
    }

    #[test]
    fn push_after_complete_is_noop() {
        let channel = EventChannel::new(SessionId::new());
        channel.complete();
        assert!(!channel.push(event(EventKind::Ack, "late")));
        assert!(channel.is_closed());
        channel.complete();
    }

    #[test]
    fn only_one_subscriber() {
        let channel = EventChannel::new(SessionId::new());
        let _first = channel.subscribe().unwrap();
        assert!(channel.subscribe().is_none());
    }

    #[test]
    fn dropping_consumer_fires_hook_once() {
        let channel = EventChannel::new(SessionId::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));
        {
            let fired = Arc::clone(&fired);
            let seen = Arc::clone(&seen);
            channel.on_detach(move |id| {
                fired.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = Some(id);
            });
        }

        let stream = channel.subscribe().unwrap();
        drop(stream);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), Some(channel.id()));
        assert!(!channel.push(event(EventKind::Ack, "after detach")));
    }

    #[test]
    fn hook_runs_before_channel_closes() {
        let (channel, stream) = EventChannel::open(SessionId::new());
        let open_in_hook = Arc::new(AtomicBool::new(false));
        {
            let observed = channel.clone();
            let open_in_hook = Arc::clone(&open_in_hook);
            channel.on_detach(move |_| {
                open_in_hook.store(!observed.is_closed(), Ordering::SeqCst);
            });
        }

        drop(stream);

        assert!(open_in_hook.load(Ordering::SeqCst));
        assert!(channel.is_closed());
        assert!(!channel.push(event(EventKind::Ack, "late")));
    }

    #[tokio::test]
    async fn opened_channel_streams_without_subscribe() {
        let (channel, mut stream) = EventChannel::open(SessionId::new());
        assert!(channel.subscribe().is_none());
        assert_eq!(stream.channel_id(), channel.id());

        channel.push(event(EventKind::Ack, "a"));
        channel.complete();
        assert_eq!(stream.next().await.unwrap().message, "a");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn completion_does_not_fire_hook() {
        let channel = EventChannel::new(SessionId::new());
        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = Arc::clone(&fired);
            channel.on_detach(move |_| fired.store(true, Ordering::SeqCst));
        }

        let mut stream = channel.subscribe().unwrap();
        channel.complete();
        assert!(stream.next().await.is_none());
        drop(stream);

        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn channel_ids_are_distinct() {
        let session = SessionId::new();
        let a = EventChannel::new(session.clone());
        let b = EventChannel::new(session);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
