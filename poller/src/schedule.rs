//! Tick schedules: fixed interval or cron expression.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::PollerError;

/// Upcoming cron runs inspected when measuring the shortest gap. 1440 runs cover a day of a
/// per-minute schedule and far more of anything coarser.
const CRON_GAP_SAMPLE: usize = 1440;

/// When the poller fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every `period`, first tick immediately on start.
    Interval(Duration),
    /// Cron expression (5, 6 or 7 fields) evaluated in `timezone` (IANA name).
    Cron { expr: String, timezone: String },
}

impl Schedule {
    pub fn every(period: Duration) -> Self {
        Schedule::Interval(period)
    }

    pub fn cron(expr: impl Into<String>, timezone: impl Into<String>) -> Self {
        Schedule::Cron {
            expr: expr.into(),
            timezone: timezone.into(),
        }
    }

    /// Shortest gap between two ticks, used to bound the long-poll timeout.
    pub(crate) fn min_gap(&self) -> Result<Duration, PollerError> {
        self.min_gap_from(Utc::now())
    }

    /// Shortest gap between consecutive runs among the `CRON_GAP_SAMPLE` runs after `from`.
    /// The sample spans a full cycle of the expression, so the result does not depend on where
    /// in that cycle `from` falls.
    fn min_gap_from(&self, from: DateTime<Utc>) -> Result<Duration, PollerError> {
        match self {
            Schedule::Interval(period) => Ok(*period),
            Schedule::Cron { expr, timezone } => {
                let schedule = parse_cron(expr)?;
                let tz = parse_timezone(timezone)?;
                let runs: Vec<_> = schedule
                    .after(&from.with_timezone(&tz))
                    .take(CRON_GAP_SAMPLE + 1)
                    .collect();
                runs.windows(2)
                    .filter_map(|pair| (pair[1].clone() - pair[0].clone()).to_std().ok())
                    .min()
                    .ok_or_else(|| {
                        PollerError::InvalidSchedule(format!(
                            "'{}' has fewer than two upcoming runs",
                            expr
                        ))
                    })
            }
        }
    }

    /// Compiles the schedule into a ticker; fails if the expression or timezone is invalid.
    pub(crate) fn ticker(&self) -> Result<Ticker, PollerError> {
        match self {
            Schedule::Interval(period) => {
                let mut interval = tokio::time::interval(*period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ok(Ticker::Interval(interval))
            }
            Schedule::Cron { expr, timezone } => Ok(Ticker::Cron {
                schedule: Box::new(parse_cron(expr)?),
                tz: parse_timezone(timezone)?,
            }),
        }
    }
}

/// The `cron` crate wants seconds and year fields; a classic 5-field expression is padded.
fn parse_cron(expr: &str) -> Result<cron::Schedule, PollerError> {
    cron::Schedule::from_str(expr)
        .or_else(|_| cron::Schedule::from_str(&format!("0 {} *", expr)))
        .map_err(|e| PollerError::InvalidSchedule(format!("'{}': {}", expr, e)))
}

fn parse_timezone(timezone: &str) -> Result<chrono_tz::Tz, PollerError> {
    timezone
        .parse::<chrono_tz::Tz>()
        .map_err(|_| PollerError::InvalidTimezone(timezone.to_string()))
}

/// Runtime form of a [`Schedule`].
pub(crate) enum Ticker {
    Interval(Interval),
    Cron {
        schedule: Box<cron::Schedule>,
        tz: chrono_tz::Tz,
    },
}

impl Ticker {
    /// Waits for the next tick. Ticks missed while a previous tick was running are skipped.
    /// Returns false when the schedule has no further runs.
    pub(crate) async fn wait(&mut self) -> bool {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
                true
            }
            Ticker::Cron { schedule, tz } => {
                let now = Utc::now();
                let Some(next) = schedule.after(&now.with_timezone(tz)).next() else {
                    return false;
                };
                let delay = (next.with_timezone(&Utc) - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_field_cron_is_padded() {
        assert!(parse_cron("* * * * *").is_ok());
        assert!(parse_cron("*/5 * * * *").is_ok());
    }

    #[test]
    fn test_invalid_cron_rejected() {
        assert!(matches!(
            parse_cron("every minute"),
            Err(PollerError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        assert_eq!(
            parse_timezone("Mars/Olympus"),
            Err(PollerError::InvalidTimezone("Mars/Olympus".to_string()))
        );
    }

    #[test]
    fn test_every_minute_gap() {
        let schedule = Schedule::cron("* * * * *", "Europe/Berlin");
        assert_eq!(schedule.min_gap().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_irregular_cron_gap_is_the_shortest_in_the_cycle() {
        let schedule = Schedule::cron("0,10 * * * * *", "UTC");
        for start in [
            "2024-03-01T12:00:00Z",
            "2024-03-01T12:00:05Z",
            "2024-03-01T12:00:30Z",
            "2024-03-01T12:00:59Z",
        ] {
            let from = start.parse::<DateTime<Utc>>().unwrap();
            assert_eq!(
                schedule.min_gap_from(from).unwrap(),
                Duration::from_secs(10),
                "from {}",
                start
            );
        }
    }

    #[test]
    fn test_hourly_pair_gap_independent_of_start() {
        let schedule = Schedule::cron("5,50 * * * *", "Europe/Berlin");
        for start in ["2024-06-10T08:00:00Z", "2024-06-10T08:20:00Z", "2024-06-10T08:55:00Z"] {
            let from = start.parse::<DateTime<Utc>>().unwrap();
            assert_eq!(schedule.min_gap_from(from).unwrap(), Duration::from_secs(15 * 60));
        }
    }

    #[test]
    fn test_cron_without_upcoming_runs_rejected() {
        let schedule = Schedule::cron("0 0 0 1 1 * 2000", "UTC");
        assert!(matches!(
            schedule.min_gap(),
            Err(PollerError::InvalidSchedule(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_ticker_waits_until_next_run() {
        let mut ticker = Schedule::cron("* * * * * *", "UTC").ticker().unwrap();

        for _ in 0..3 {
            let started = tokio::time::Instant::now();
            assert!(ticker.wait().await);
            assert!(started.elapsed() <= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cron_ticker_ends_when_schedule_is_exhausted() {
        let mut ticker = Schedule::cron("0 0 0 1 1 * 2000", "UTC").ticker().unwrap();

        assert!(!ticker.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_first_tick_is_immediate() {
        let mut ticker = Schedule::every(Duration::from_secs(5)).ticker().unwrap();
        let started = tokio::time::Instant::now();

        assert!(ticker.wait().await);

        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
