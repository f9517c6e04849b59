use std::time::Duration;

use tracing::{info, warn};

/// Delay used when the configured schedule is empty or unparseable.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid delay entry {entry:?} at position {position}")]
    InvalidEntry { position: usize, entry: String },
    #[error("delay entry at position {0} must be positive")]
    NonPositive(usize),
}

/// Ordered wait durations indexed by poll attempt.
///
/// Never empty. Built once when configuration is loaded and shared read-only
/// by every chain afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelaySchedule {
    delays: Vec<Duration>,
}

impl DelaySchedule {
    /// Parse comma-separated whole seconds, e.g. `"5,10,20,30"`.
    ///
    /// Blank entries are skipped. An empty result yields the default schedule.
    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let mut delays = Vec::new();
        for (position, entry) in raw.split(',').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }
            let secs: u64 = entry.parse().map_err(|_| ScheduleError::InvalidEntry {
                position,
                entry: entry.to_string(),
            })?;
            if secs == 0 {
                return Err(ScheduleError::NonPositive(position));
            }
            delays.push(Duration::from_secs(secs));
        }
        Ok(Self::from_durations(delays))
    }

    /// Parse configuration text, falling back to the default schedule on error.
    pub fn from_config(raw: &str) -> Self {
        match Self::parse(raw) {
            Ok(schedule) => {
                info!(delays = ?schedule.delays, "Polling intervals loaded");
                schedule
            }
            Err(e) => {
                warn!(raw = raw, error = %e, "Invalid polling intervals, using default");
                Self::default()
            }
        }
    }

    /// Build from explicit durations. Empty input yields the default schedule.
    pub fn from_durations(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            return Self::default();
        }
        Self { delays }
    }

    /// Delay before attempt `attempt`; the last entry is reused past the end.
    pub fn get(&self, attempt: usize) -> Duration {
        self.delays
            .get(attempt)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(DEFAULT_DELAY)
    }

    /// Number of attempts a chain may make before timing out.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for DelaySchedule {
    fn default() -> Self {
        Self {
            delays: vec![DEFAULT_DELAY],
        }
    }
}
