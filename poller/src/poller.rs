//! The poller: scheduling loop, fetch, ordered hand-off and cursor advancement.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dbot_core::{Event, FetchRequest, Transport, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{PollerConfig, PollerError};
use crate::schedule::Ticker;

/// Sorts a fetched batch ascending by identifier; the transport does not guarantee order.
pub fn order_batch(events: &mut [Event]) {
    events.sort_by_key(|event| event.id);
}

/// Next cursor after delivering up to `last_delivered`: `id + 1` when that moves forward,
/// otherwise `cursor` unchanged. Saturates at `i64::MAX`.
pub fn advance_cursor(cursor: i64, last_delivered: Option<i64>) -> i64 {
    match last_delivered.map(|id| id.saturating_add(1)) {
        Some(next) if next > cursor => next,
        _ => cursor,
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub delivered: usize,
    pub cursor: i64,
}

/// State shared by the scheduling loop and manual ticks.
struct PollState {
    transport: Arc<dyn Transport>,
    config: PollerConfig,
    /// Written only while `tick_lock` is held.
    cursor: AtomicI64,
    tick_lock: tokio::sync::Mutex<()>,
    output: mpsc::Sender<Event>,
}

impl PollState {
    fn request(&self, offset: i64) -> FetchRequest {
        FetchRequest {
            offset,
            limit: self.config.limit,
            timeout_secs: self.config.timeout_secs,
            allowed_updates: self.config.allowed_updates.clone(),
        }
    }

    async fn fetch(&self) -> Result<Vec<Event>, TransportError> {
        let request = self.request(self.cursor.load(Ordering::Acquire));
        self.transport.fetch_events(&request).await
    }

    /// Fetches, orders and hands off one batch, then advances the cursor past what was
    /// accepted. The caller must hold `tick_lock`. Cancellation interrupts only the hand-off;
    /// undelivered events stay behind the cursor and are fetched again.
    async fn tick_locked(&self, cancel: &CancellationToken) -> Result<TickReport, TransportError> {
        let cursor = self.cursor.load(Ordering::Acquire);
        let mut events = self
            .transport
            .fetch_events(&self.request(cursor))
            .await?;
        let fetched = events.len();
        order_batch(&mut events);

        let mut delivered = 0;
        let mut last_delivered = None;
        for event in events {
            let id = event.id;
            let accepted = tokio::select! {
                biased;
                sent = self.output.send(event) => sent.is_ok(),
                _ = cancel.cancelled() => false,
            };
            if !accepted {
                warn!(update_id = id, "output stream unavailable, stopping hand-off");
                break;
            }
            delivered += 1;
            last_delivered = Some(id);
        }

        let next = advance_cursor(cursor, last_delivered);
        self.cursor.store(next, Ordering::Release);

        Ok(TickReport {
            fetched,
            delivered,
            cursor: next,
        })
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Cursor-based update poller.
///
/// One scheduling loop drives the ticks; a tick never overlaps another (a tick that would start
/// while one is in progress is skipped). Events go to a bounded output stream, taken once with
/// [`Poller::take_output_stream`].
pub struct Poller {
    state: Arc<PollState>,
    output: Mutex<Option<mpsc::Receiver<Event>>>,
    running: Mutex<Option<Running>>,
}

impl Poller {
    /// Validates `config` and creates a stopped poller with cursor 0.
    pub fn new(transport: Arc<dyn Transport>, config: PollerConfig) -> Result<Self, PollerError> {
        config.validate()?;
        let capacity = config.limit as usize;
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            state: Arc::new(PollState {
                transport,
                config,
                cursor: AtomicI64::new(0),
                tick_lock: tokio::sync::Mutex::new(()),
                output: tx,
            }),
            output: Mutex::new(Some(rx)),
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.state.config
    }

    /// Current cursor: the first update id not yet delivered.
    pub fn cursor(&self) -> i64 {
        self.state.cursor.load(Ordering::Acquire)
    }

    /// The ordered stream of delivered events. Can be taken once.
    pub fn take_output_stream(&self) -> Result<mpsc::Receiver<Event>, PollerError> {
        self.output
            .lock()
            .map_err(|_| PollerError::OutputStreamTaken)?
            .take()
            .ok_or(PollerError::OutputStreamTaken)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| {
                running
                    .as_ref()
                    .is_some_and(|running| !running.handle.is_finished())
            })
            .unwrap_or(false)
    }

    /// Starts the scheduling loop. No-op when already running. Must be called inside a tokio
    /// runtime.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), PollerError> {
        let mut running = self
            .running
            .lock()
            .map_err(|e| PollerError::Scheduling(e.to_string()))?;
        if running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            debug!("poller already running");
            return Ok(());
        }

        let ticker = self.state.config.schedule.ticker()?;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.state.clone(), ticker, cancel.clone()));
        *running = Some(Running { cancel, handle });

        info!(
            schedule = ?self.state.config.schedule,
            cursor = self.cursor(),
            "poller started"
        );
        Ok(())
    }

    /// Stops scheduling further ticks and waits for the loop to exit. A fetch in progress
    /// completes; its hand-off stops at the first event not yet accepted.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };
        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "poller loop ended abnormally");
            }
            info!(cursor = self.cursor(), "poller stopped");
        }
    }

    /// Issues one fetch with the current cursor without delivering anything.
    pub async fn fetch(&self) -> Result<Vec<Event>, TransportError> {
        self.state.fetch().await
    }

    /// Runs one tick now (waiting for a tick in progress to finish first).
    pub async fn poll_once(&self) -> Result<TickReport, TransportError> {
        let _guard = self.state.tick_lock.lock().await;
        self.state.tick_locked(&CancellationToken::new()).await
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(running) = running.take() {
                running.cancel.cancel();
            }
        }
    }
}

async fn run_loop(state: Arc<PollState>, mut ticker: Ticker, cancel: CancellationToken) {
    loop {
        let has_next = tokio::select! {
            _ = cancel.cancelled() => break,
            has_next = ticker.wait() => has_next,
        };
        if !has_next {
            warn!("schedule has no further runs, poller loop exiting");
            break;
        }

        let Ok(_guard) = state.tick_lock.try_lock() else {
            debug!("previous tick still running, tick skipped");
            continue;
        };

        let started = Instant::now();
        match state.tick_locked(&cancel).await {
            Ok(report) => {
                if report.fetched > 0 {
                    info!(
                        fetched = report.fetched,
                        delivered = report.delivered,
                        cursor = report.cursor,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "step: batch delivered"
                    );
                } else {
                    debug!(cursor = report.cursor, "step: no new updates");
                }
            }
            Err(TransportError::Decode(e)) => {
                error!(error = %e, "malformed getUpdates response, batch dropped");
            }
            Err(e) => {
                warn!(error = %e, "failed to get updates, retrying on next tick");
            }
        }
    }
    debug!("poller loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(events: &[Event]) -> Vec<i64> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_order_batch_sorts_ascending() {
        let mut events = vec![Event::other(5, "x"), Event::other(3, "x"), Event::other(4, "x")];
        order_batch(&mut events);
        assert_eq!(ids(&events), vec![3, 4, 5]);
    }

    #[test]
    fn test_advance_cursor() {
        assert_eq!(advance_cursor(0, Some(5)), 6);
        assert_eq!(advance_cursor(10, Some(5)), 10);
        assert_eq!(advance_cursor(10, None), 10);
        assert_eq!(advance_cursor(6, Some(6)), 7);
    }

    #[test]
    fn test_advance_cursor_saturates_at_max_id() {
        assert_eq!(advance_cursor(0, Some(i64::MAX)), i64::MAX);
        assert_eq!(advance_cursor(i64::MAX, Some(i64::MAX)), i64::MAX);
        assert_eq!(advance_cursor(i64::MAX, Some(3)), i64::MAX);
    }

    proptest! {
        #[test]
        fn prop_batches_deliver_sorted(mut batch in proptest::collection::vec(0i64..10_000, 0..50)) {
            let mut events: Vec<Event> = batch.iter().map(|id| Event::other(*id, "x")).collect();
            order_batch(&mut events);
            batch.sort();
            prop_assert_eq!(ids(&events), batch);
        }

        #[test]
        fn prop_cursor_monotonic_and_one_past_max(
            batches in proptest::collection::vec(proptest::collection::vec(0i64..10_000, 1..20), 1..10)
        ) {
            let mut cursor = 0;
            let mut max_seen: Option<i64> = None;
            for batch in batches {
                let mut events: Vec<Event> = batch.iter().map(|id| Event::other(*id, "x")).collect();
                order_batch(&mut events);
                let last = events.last().map(|e| e.id);
                let next = advance_cursor(cursor, last);
                prop_assert!(next >= cursor);
                cursor = next;
                max_seen = max_seen.max(last);
                prop_assert_eq!(cursor, max_seen.map_or(0, |m| m + 1));
            }
        }
    }
}
