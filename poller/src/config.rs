//! Poller configuration and its validation errors.

use std::time::Duration;

use dbot_core::DbotError;
use thiserror::Error;

use crate::schedule::Schedule;

pub const DEFAULT_CRON_TIMEZONE: &str = "Europe/Berlin";
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_POLLING_TIMEOUT_SECS: u32 = 1;
pub const DEFAULT_UPDATES_LIMIT: u32 = 100;
pub const MAX_UPDATES_LIMIT: u32 = 100;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Invalid poller settings (fail fast at construction) or a schedule that cannot be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollerError {
    #[error("interval must be at least a second")]
    InvalidInterval,

    #[error("updates limit must be between 1 and 100, got {0}")]
    InvalidLimit(u32),

    #[error("long-poll timeout ({timeout_secs}s) exceeds the tick interval ({interval_secs}s)")]
    TimeoutExceedsInterval { timeout_secs: u32, interval_secs: u64 },

    #[error("invalid cron schedule {0}")]
    InvalidSchedule(String),

    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("output stream already taken")]
    OutputStreamTaken,

    #[error("failed to start poller: {0}")]
    Scheduling(String),
}

impl From<PollerError> for DbotError {
    fn from(err: PollerError) -> Self {
        match err {
            PollerError::Scheduling(_) | PollerError::OutputStreamTaken => {
                DbotError::Scheduling(err.to_string())
            }
            other => DbotError::Config(other.to_string()),
        }
    }
}

/// How and what the poller fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub schedule: Schedule,
    /// Long-poll timeout; must not exceed the gap between ticks.
    pub timeout_secs: u32,
    /// Batch size, 1..=100.
    pub limit: u32,
    /// Update kinds to receive; empty means all.
    pub allowed_updates: Vec<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            schedule: Schedule::every(Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS)),
            timeout_secs: DEFAULT_POLLING_TIMEOUT_SECS,
            limit: DEFAULT_UPDATES_LIMIT,
            allowed_updates: Vec::new(),
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.limit == 0 || self.limit > MAX_UPDATES_LIMIT {
            return Err(PollerError::InvalidLimit(self.limit));
        }

        if let Schedule::Interval(period) = &self.schedule {
            if *period < MIN_INTERVAL {
                return Err(PollerError::InvalidInterval);
            }
        }

        let gap = self.schedule.min_gap()?;
        if Duration::from_secs(u64::from(self.timeout_secs)) > gap {
            return Err(PollerError::TimeoutExceedsInterval {
                timeout_secs: self.timeout_secs,
                interval_secs: gap.as_secs(),
            });
        }

        Ok(())
    }
}
