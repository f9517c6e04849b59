//! Poll chain state machine.
//!
//! ```text
//! Starting ──start ok──▶ Active(0) ──IN_PROGRESS──▶ Active(1) ─ … ─▶ Active(n)
//!    │                      │                                         │
//!    └─start failed─▶ Done(ERROR)   Done(COMPLETED|FAILED|REJECTED|ERROR)   n ≥ len ─▶ Done(TIMEOUT)
//! ```
//!
//! `Done` and `Cancelled` are absorbing: every transition method returns
//! `None`/`Finished` once reached. The machine is pure; the orchestrator owns
//! the timers and external calls that drive it.

use std::time::Duration;

use relay_core::classify::classify;
use relay_core::errors::ExternalCallError;
use relay_core::events::{DomainEvent, EventKind};
use relay_core::ids::{ChainId, SessionId, TrackingId};
use relay_core::schedule::DelaySchedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStatus {
    /// Waiting for the start call's result.
    Starting,
    /// The next status call is attempt `attempt`.
    Active { attempt: usize },
    /// Ended with a terminal event of this kind.
    Done(EventKind),
    /// Consumer went away; ended without a terminal event.
    Cancelled,
}

/// What the driver should do next.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Wait `delay`, then make status call `attempt`.
    Poll { attempt: usize, delay: Duration },
    /// Attempt budget exhausted; push this event and stop.
    Timeout(DomainEvent),
    Finished,
}

#[derive(Debug)]
pub struct PollChain {
    chain_id: ChainId,
    session_id: SessionId,
    tracking_id: TrackingId,
    status: ChainStatus,
}

impl PollChain {
    pub fn new(chain_id: ChainId, session_id: SessionId, tracking_id: TrackingId) -> Self {
        Self {
            chain_id,
            session_id,
            tracking_id,
            status: ChainStatus::Starting,
        }
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn tracking_id(&self) -> &TrackingId {
        &self.tracking_id
    }

    pub fn status(&self) -> ChainStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, ChainStatus::Done(_) | ChainStatus::Cancelled)
    }

    /// Apply the start call's result.
    pub fn on_start(&mut self, result: Result<String, ExternalCallError>) -> Option<DomainEvent> {
        if self.status != ChainStatus::Starting {
            return None;
        }
        let tracking_id = self.tracking_id.clone();
        match result {
            Ok(_) => {
                self.status = ChainStatus::Active { attempt: 0 };
                Some(DomainEvent::ack(tracking_id))
            }
            Err(e) => {
                self.status = ChainStatus::Done(EventKind::Error);
                Some(DomainEvent::error(format!("Start API failed: {e}"), tracking_id))
            }
        }
    }

    /// Decide the next step against the delay schedule.
    pub fn next_step(&mut self, schedule: &DelaySchedule) -> Step {
        let ChainStatus::Active { attempt } = self.status else {
            return Step::Finished;
        };
        if attempt >= schedule.len() {
            self.status = ChainStatus::Done(EventKind::Timeout);
            return Step::Timeout(DomainEvent::timeout(self.tracking_id.clone()));
        }
        Step::Poll {
            attempt,
            delay: schedule.get(attempt),
        }
    }

    /// Apply a status call's result. Only `IN_PROGRESS` keeps the chain alive.
    pub fn on_status(&mut self, result: Result<String, ExternalCallError>) -> Option<DomainEvent> {
        let ChainStatus::Active { attempt } = self.status else {
            return None;
        };
        let tracking_id = self.tracking_id.clone();
        let event = match result {
            Ok(raw) => classify(&raw, tracking_id),
            Err(e) if e.is_response_error() => {
                DomainEvent::error(format!("Polling failed: {e}"), tracking_id)
            }
            Err(e) => DomainEvent::error(format!("Exception: {e}"), tracking_id),
        };
        self.status = if event.is_terminal() {
            ChainStatus::Done(event.kind)
        } else {
            ChainStatus::Active {
                attempt: attempt + 1,
            }
        };
        Some(event)
    }

    /// Stop without producing anything further. No-op once finished.
    pub fn cancel(&mut self) {
        if !self.is_finished() {
            self.status = ChainStatus::Cancelled;
        }
    }
}
