//! Poll orchestrator: ties sessions to their channels and poll chains.
//!
//! Each accepted start spawns one task that drives a [`PollChain`] through the
//! start call, timer waits, and status calls. A session has at most one active
//! chain; the chain is cancelled as soon as the session's consumer goes away
//! so no external calls are made on behalf of a client that left.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use relay_core::events::DomainEvent;
use relay_core::ids::{ChainId, SessionId, TrackingId};
use relay_core::request::StartRequest;
use relay_core::schedule::DelaySchedule;

use crate::chain::{PollChain, Step};
use crate::channel::{EventChannel, EventStream};
use crate::client::InquiryClient;
use crate::error::EngineError;
use crate::registry::SessionRegistry;

/// Snapshot of a session's running chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainProgress {
    pub chain_id: ChainId,
    pub tracking_id: TrackingId,
    /// Attempt index of the status call currently pending.
    pub attempt: usize,
}

/// Tracks an active chain.
struct ActiveChain {
    chain_id: ChainId,
    tracking_id: TrackingId,
    cancel: CancellationToken,
    attempt: Arc<AtomicUsize>,
}

type ChainTable = DashMap<SessionId, ActiveChain>;

pub struct PollOrchestrator {
    client: Arc<dyn InquiryClient>,
    registry: Arc<SessionRegistry>,
    schedule: Arc<DelaySchedule>,
    active_chains: Arc<ChainTable>,
}

impl PollOrchestrator {
    pub fn new(
        client: Arc<dyn InquiryClient>,
        registry: Arc<SessionRegistry>,
        schedule: DelaySchedule,
    ) -> Self {
        Self {
            client,
            registry,
            schedule: Arc::new(schedule),
            active_chains: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register a channel for `session_id` and return its consumer stream.
    ///
    /// When the returned stream is dropped before the channel completes, the
    /// session is removed (if this channel is still the current one) and its
    /// chain is cancelled.
    pub fn connect(&self, session_id: &SessionId) -> EventStream {
        let (channel, stream) = EventChannel::open(session_id.clone());
        info!(session_id = %session_id, channel = %channel.id(), "SSE connected");

        let registry = Arc::downgrade(&self.registry);
        let chains = Arc::downgrade(&self.active_chains);
        let sid = session_id.clone();
        channel.on_detach(move |channel_id| {
            info!(session_id = %sid, channel = %channel_id, "SSE disconnected");
            let Some(registry) = registry.upgrade() else {
                return;
            };
            if registry.remove_if_current(&sid, channel_id).is_some() {
                if let Some(chains) = chains.upgrade() {
                    cancel_in(&chains, &sid);
                }
            }
        });

        self.registry.install(channel);
        stream
    }

    /// Complete and remove the session's channel and stop its chain.
    /// Returns whether a channel was attached. Idempotent.
    pub fn disconnect(&self, session_id: &SessionId) -> bool {
        let removed = self.registry.remove(session_id);
        cancel_in(&self.active_chains, session_id);
        match removed {
            Some(channel) => {
                channel.complete();
                info!(session_id = %session_id, channel = %channel.id(), "Session disconnected");
                true
            }
            None => false,
        }
    }

    /// Accept a start request for a connected session and launch its chain.
    pub fn start(&self, session_id: &SessionId, request: StartRequest) -> Result<ChainId, EngineError> {
        if !self.registry.contains(session_id) {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }

        let chain_id = ChainId::new();
        let (cancel, attempt) = self.claim_chain(session_id, &chain_id, &request.tracking_id)?;

        info!(
            session_id = %session_id,
            tracking_id = %request.tracking_id,
            chain_id = %chain_id,
            "Starting external process"
        );

        let chain = PollChain::new(chain_id.clone(), session_id.clone(), request.tracking_id.clone());
        let driver = ChainDriver {
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            schedule: Arc::clone(&self.schedule),
            cancel,
            attempt,
        };
        let chains = Arc::clone(&self.active_chains);
        let session_id = session_id.clone();
        let spawned_id = chain_id.clone();

        tokio::spawn(async move {
            let chain = driver.run(chain, request).await;
            debug!(
                session_id = %session_id,
                chain_id = %spawned_id,
                status = ?chain.status(),
                "Poll chain finished"
            );
            chains.remove_if(&session_id, |_, active| active.chain_id == spawned_id);
        });

        Ok(chain_id)
    }

    /// Take the session's single chain slot.
    ///
    /// The session is checked again after the slot is taken: a `disconnect`
    /// that removed it in between may have found no chain to cancel.
    fn claim_chain(
        &self,
        session_id: &SessionId,
        chain_id: &ChainId,
        tracking_id: &TrackingId,
    ) -> Result<(CancellationToken, Arc<AtomicUsize>), EngineError> {
        let cancel = CancellationToken::new();
        let attempt = Arc::new(AtomicUsize::new(0));

        match self.active_chains.entry(session_id.clone()) {
            Entry::Occupied(existing) => {
                return Err(EngineError::ChainAlreadyActive {
                    session_id: session_id.to_string(),
                    tracking_id: existing.get().tracking_id.to_string(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(ActiveChain {
                    chain_id: chain_id.clone(),
                    tracking_id: tracking_id.clone(),
                    cancel: cancel.clone(),
                    attempt: Arc::clone(&attempt),
                });
            }
        }

        if !self.registry.contains(session_id) {
            self.active_chains
                .remove_if(session_id, |_, active| &active.chain_id == chain_id);
            cancel.cancel();
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        Ok((cancel, attempt))
    }

    pub fn chain_progress(&self, session_id: &SessionId) -> Option<ChainProgress> {
        self.active_chains.get(session_id).map(|active| ChainProgress {
            chain_id: active.chain_id.clone(),
            tracking_id: active.tracking_id.clone(),
            attempt: active.attempt.load(Ordering::Relaxed),
        })
    }

    pub fn active_chain_count(&self) -> usize {
        self.active_chains.len()
    }

    /// Cancel every chain. Used at shutdown.
    pub fn cancel_all(&self) -> usize {
        let count = self.active_chains.len();
        for entry in self.active_chains.iter() {
            entry.value().cancel.cancel();
        }
        self.active_chains.clear();
        count
    }
}

fn cancel_in(chains: &ChainTable, session_id: &SessionId) -> bool {
    match chains.remove(session_id) {
        Some((_, active)) => {
            active.cancel.cancel();
            debug!(session_id = %session_id, chain_id = %active.chain_id, "Poll chain cancelled");
            true
        }
        None => false,
    }
}

/// Everything a chain task needs; owned by the spawned task.
struct ChainDriver {
    client: Arc<dyn InquiryClient>,
    registry: Arc<SessionRegistry>,
    schedule: Arc<DelaySchedule>,
    cancel: CancellationToken,
    attempt: Arc<AtomicUsize>,
}

impl ChainDriver {
    async fn run(&self, mut chain: PollChain, request: StartRequest) -> PollChain {
        let session_id = chain.session_id().clone();
        let tracking_id = chain.tracking_id().clone();

        if !self.registry.contains(&session_id) {
            debug!(session_id = %session_id, "Session gone before start call");
            chain.cancel();
            return chain;
        }

        let started = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                chain.cancel();
                return chain;
            }
            result = self.client.start(&request) => result,
        };
        match &started {
            Ok(ack) => info!(session_id = %session_id, tracking_id = %tracking_id, ack = %ack, "Received ACK from start API"),
            Err(e) => error!(session_id = %session_id, tracking_id = %tracking_id, error = %e, kind = e.error_kind(), "Failed to call start API"),
        }
        if let Some(event) = chain.on_start(started) {
            self.push(&session_id, event);
        }

        loop {
            let (attempt, delay) = match chain.next_step(&self.schedule) {
                Step::Finished => break,
                Step::Timeout(event) => {
                    warn!(session_id = %session_id, tracking_id = %tracking_id, "Polling limit reached");
                    self.push(&session_id, event);
                    break;
                }
                Step::Poll { attempt, delay } => (attempt, delay),
            };
            self.attempt.store(attempt, Ordering::Relaxed);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    chain.cancel();
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.registry.contains(&session_id) {
                debug!(session_id = %session_id, "Session gone before status call");
                chain.cancel();
                break;
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    chain.cancel();
                    break;
                }
                result = self.client.status(&tracking_id, attempt) => result,
            };
            match &result {
                Ok(status) => info!(tracking_id = %tracking_id, attempt, status = %status, "Status response"),
                Err(e) => error!(tracking_id = %tracking_id, attempt, error = %e, kind = e.error_kind(), "Polling failed"),
            }

            if let Some(event) = chain.on_status(result) {
                if event.is_terminal() {
                    info!(tracking_id = %tracking_id, status = %event.kind, "Polling stopped after terminal state");
                }
                self.push(&session_id, event);
            }
        }

        chain
    }

    fn push(&self, session_id: &SessionId, event: DomainEvent) {
        self.registry.push(session_id, event);
    }
}
