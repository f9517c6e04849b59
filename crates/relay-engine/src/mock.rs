use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::errors::ExternalCallError;
use relay_core::ids::TrackingId;
use relay_core::request::StartRequest;

use crate::client::InquiryClient;

/// Pre-programmed reply for deterministic tests without a real API.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    Error(ExternalCallError),
    /// Wait a duration, then resolve the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn network_error(message: &str) -> Self {
        Self::Error(ExternalCallError::Network(message.to_string()))
    }

    pub fn http_error(status: u16, body: &str) -> Self {
        Self::Error(ExternalCallError::from_status(status, "Mock Error", body))
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Scripted `InquiryClient`. Start replies default to an acknowledgement;
/// status replies are consumed in order and fail once exhausted.
pub struct MockInquiryClient {
    start_replies: Mutex<VecDeque<MockReply>>,
    status_replies: Mutex<VecDeque<MockReply>>,
    start_calls: AtomicUsize,
    status_attempts: Mutex<Vec<usize>>,
}

impl Default for MockInquiryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInquiryClient {
    pub fn new() -> Self {
        Self {
            start_replies: Mutex::new(VecDeque::new()),
            status_replies: Mutex::new(VecDeque::new()),
            start_calls: AtomicUsize::new(0),
            status_attempts: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: successful start followed by these status bodies.
    pub fn with_statuses(statuses: &[&str]) -> Self {
        let mock = Self::new();
        for status in statuses {
            mock.push_status(MockReply::text(status));
        }
        mock
    }

    pub fn with_start(self, reply: MockReply) -> Self {
        self.start_replies.lock().push_back(reply);
        self
    }

    pub fn push_status(&self, reply: MockReply) {
        self.status_replies.lock().push_back(reply);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Attempt indices of every status call made so far, in call order.
    pub fn status_attempts(&self) -> Vec<usize> {
        self.status_attempts.lock().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_attempts.lock().len()
    }
}

#[async_trait]
impl InquiryClient for MockInquiryClient {
    async fn start(&self, _request: &StartRequest) -> Result<String, ExternalCallError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.start_replies.lock().pop_front();
        match reply {
            Some(reply) => resolve(reply).await,
            None => Ok("ACK".to_string()),
        }
    }

    async fn status(
        &self,
        _tracking_id: &TrackingId,
        attempt: usize,
    ) -> Result<String, ExternalCallError> {
        self.status_attempts.lock().push(attempt);
        let reply = self.status_replies.lock().pop_front();
        match reply {
            Some(reply) => resolve(reply).await,
            None => Err(ExternalCallError::Network(format!(
                "MockInquiryClient: no status reply configured for attempt {attempt}"
            ))),
        }
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve(reply: MockReply) -> Result<String, ExternalCallError> {
    let mut current = reply;
    loop {
        match current {
            MockReply::Text(text) => return Ok(text),
            MockReply::Error(e) => return Err(e),
            MockReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
