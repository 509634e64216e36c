//! Polling and delivery config. Loaded from env; converted to [`PollerConfig`] for the poller.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use poller::{
    PollerConfig, Schedule, DEFAULT_CRON_TIMEZONE, DEFAULT_POLLING_INTERVAL_SECS,
    DEFAULT_POLLING_TIMEOUT_SECS, DEFAULT_UPDATES_LIMIT,
};

pub const DEFAULT_DISPATCH_WORKERS: usize = 4;

/// How often and what to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// POLLING_INTERVAL_SECS
    pub interval_secs: u64,
    /// POLLING_CRON_SCHEDULE; replaces the interval when set
    pub cron_schedule: Option<String>,
    /// POLLING_CRON_TIMEZONE
    pub cron_timezone: String,
    /// POLLING_TIMEOUT_SECS
    pub timeout_secs: u32,
    /// POLLING_UPDATES_LIMIT
    pub updates_limit: u32,
    /// ALLOWED_UPDATES, comma separated; empty means all kinds
    pub allowed_updates: Vec<String>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            cron_schedule: None,
            cron_timezone: DEFAULT_CRON_TIMEZONE.to_string(),
            timeout_secs: DEFAULT_POLLING_TIMEOUT_SECS,
            updates_limit: DEFAULT_UPDATES_LIMIT,
            allowed_updates: Vec::new(),
        }
    }
}

impl PollingConfig {
    pub fn load() -> Result<Self> {
        Ok(Self {
            interval_secs: env_or("POLLING_INTERVAL_SECS", DEFAULT_POLLING_INTERVAL_SECS)?,
            cron_schedule: env::var("POLLING_CRON_SCHEDULE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            cron_timezone: env::var("POLLING_CRON_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_CRON_TIMEZONE.to_string()),
            timeout_secs: env_or("POLLING_TIMEOUT_SECS", DEFAULT_POLLING_TIMEOUT_SECS)?,
            updates_limit: env_or("POLLING_UPDATES_LIMIT", DEFAULT_UPDATES_LIMIT)?,
            allowed_updates: env::var("ALLOWED_UPDATES")
                .map(|s| parse_list(&s))
                .unwrap_or_default(),
        })
    }

    pub fn schedule(&self) -> Schedule {
        match &self.cron_schedule {
            Some(expr) => Schedule::cron(expr.clone(), self.cron_timezone.clone()),
            None => Schedule::every(Duration::from_secs(self.interval_secs)),
        }
    }

    /// Not validated here; [`poller::Poller::new`] validates.
    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            schedule: self.schedule(),
            timeout_secs: self.timeout_secs,
            limit: self.updates_limit,
            allowed_updates: self.allowed_updates.clone(),
        }
    }
}

/// Fan-out of delivered events to processing workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// DISPATCH_WORKERS
    pub workers: usize,
    /// HANDLER_TIMEOUT_SECS; no timeout when unset
    pub handler_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_DISPATCH_WORKERS,
            handler_timeout: None,
        }
    }
}

impl DispatchConfig {
    pub fn load() -> Result<Self> {
        let handler_timeout = match env::var("HANDLER_TIMEOUT_SECS") {
            Ok(secs) => Some(Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("HANDLER_TIMEOUT_SECS is not a number: {}", secs))?,
            )),
            Err(_) => None,
        };
        Ok(Self {
            workers: env_or("DISPATCH_WORKERS", DEFAULT_DISPATCH_WORKERS)?,
            handler_timeout,
        })
    }
}

/// Parsed env var, or `default` when unset. A set but unparsable value is an error.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        Err(_) => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
