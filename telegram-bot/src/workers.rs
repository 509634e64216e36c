//! Delivery workers: bounded fan-out of delivered events to the router.
//!
//! Events are sharded by chat id, so one chat is processed serially and in delivery order while
//! different chats proceed in parallel. Queues are bounded; a full queue makes
//! [`WorkerPool::submit`] wait, which in turn holds back the poller's output stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dbot_core::{DbotError, Event, HandlerError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::router::Router;

/// Per-worker queue capacity.
pub const WORKER_QUEUE_CAPACITY: usize = 64;

/// Worker index for an event. Non-message events go to worker 0.
pub fn shard_for(event: &Event, workers: usize) -> usize {
    match event.chat_id() {
        Some(chat_id) if workers > 0 => chat_id.rem_euclid(workers as i64) as usize,
        _ => 0,
    }
}

/// Fixed set of worker tasks, each draining its own bounded queue.
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Event>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` (at least one) tasks. Must be called inside a tokio runtime.
    pub fn spawn(
        router: Arc<Router>,
        workers: usize,
        queue_capacity: usize,
        handler_timeout: Option<Duration>,
    ) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            senders.push(tx);
            handles.push(tokio::spawn(worker_loop(
                worker,
                router.clone(),
                rx,
                handler_timeout,
            )));
        }
        Self { senders, handles }
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queues `event` on its chat's worker, waiting while that queue is full.
    pub async fn submit(&self, event: Event) -> Result<(), DbotError> {
        let worker = shard_for(&event, self.senders.len());
        self.senders[worker]
            .send(event)
            .await
            .map_err(|e| DbotError::Scheduling(format!("worker {} is gone: {}", worker, e)))
    }

    /// Closes the queues and waits until every queued event has been processed.
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "delivery worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    router: Arc<Router>,
    mut rx: mpsc::Receiver<Event>,
    handler_timeout: Option<Duration>,
) {
    while let Some(event) = rx.recv().await {
        let update_id = event.id;
        let chat_id = event.chat_id();
        let started = Instant::now();

        // Each event runs in its own task so a panicking handler cannot take the worker down.
        let router = router.clone();
        let mut task = tokio::spawn(async move { router.process_event(&event).await });
        let joined = match handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    Ok(Err(DbotError::Handler(HandlerError::Failed(format!(
                        "processing timed out after {:?}",
                        limit
                    )))))
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(routed)) => debug!(
                worker,
                update_id,
                chat_id = ?chat_id,
                routed = ?routed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "step: event processed"
            ),
            Ok(Err(e)) => warn!(
                worker,
                update_id,
                chat_id = ?chat_id,
                error = %e,
                "event processing failed"
            ),
            Err(e) => error!(
                worker,
                update_id,
                chat_id = ?chat_id,
                error = %e,
                "event processing panicked"
            ),
        }
    }
    debug!(worker, "delivery worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conversation::ConversationOrchestrator;
    use dbot_core::{handler_fn, Chat, Message};
    use dispatcher::Dispatcher;
    use std::sync::Mutex;

    fn text_event(id: i64, chat_id: i64, text: &str) -> Event {
        Event::message(
            id,
            Message {
                id,
                user: None,
                chat: Chat {
                    id: chat_id,
                    chat_type: "private".to_string(),
                },
                text: Some(text.to_string()),
                created_at: Utc::now(),
            },
        )
    }

    async fn recording_router(log: Arc<Mutex<Vec<(i64, i64)>>>) -> Arc<Router> {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register_default_handler(Arc::new(handler_fn(move |event: Event| {
                let log = log.clone();
                async move {
                    // Later events of a chat finish faster; serial processing must still keep order.
                    let delay = 50 - (event.id % 50) as u64;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    log.lock()
                        .unwrap()
                        .push((event.chat_id().unwrap_or_default(), event.id));
                    Ok(())
                }
            })))
            .await
            .unwrap();
        Arc::new(Router::new(
            Arc::new(dispatcher),
            Arc::new(ConversationOrchestrator::new()),
        ))
    }

    #[test]
    fn test_shard_for() {
        assert_eq!(shard_for(&text_event(1, 10, "x"), 4), 2);
        assert_eq!(shard_for(&text_event(1, -3, "x"), 4), 1);
        assert_eq!(shard_for(&Event::other(1, "poll"), 4), 0);
        assert_eq!(shard_for(&text_event(1, 10, "x"), 0), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_chat_processed_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::spawn(recording_router(log.clone()).await, 3, 8, None);

        for id in 1..=6 {
            pool.submit(text_event(id, 100 + id % 2, "hi")).await.unwrap();
        }
        pool.shutdown().await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        for chat in [100, 101] {
            let ids: Vec<i64> = log.iter().filter(|(c, _)| *c == chat).map(|(_, id)| *id).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            assert_eq!(ids, sorted);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout_does_not_stop_worker() {
        let dispatcher = Dispatcher::new();
        let done = Arc::new(Mutex::new(Vec::new()));
        let done_in_handler = done.clone();
        dispatcher
            .register_default_handler(Arc::new(handler_fn(move |event: Event| {
                let done = done_in_handler.clone();
                async move {
                    if event.id == 1 {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    }
                    done.lock().unwrap().push(event.id);
                    Ok(())
                }
            })))
            .await
            .unwrap();
        let router = Arc::new(Router::new(
            Arc::new(dispatcher),
            Arc::new(ConversationOrchestrator::new()),
        ));
        let pool = WorkerPool::spawn(router, 1, 8, Some(Duration::from_secs(1)));

        pool.submit(text_event(1, 5, "slow")).await.unwrap();
        pool.submit(text_event(2, 5, "fast")).await.unwrap();
        pool.shutdown().await;

        assert_eq!(*done.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_worker() {
        let dispatcher = Dispatcher::new();
        let done = Arc::new(Mutex::new(Vec::new()));
        let done_in_handler = done.clone();
        dispatcher
            .register_default_handler(Arc::new(handler_fn(move |event: Event| {
                let done = done_in_handler.clone();
                async move {
                    if event.id == 1 {
                        panic!("handler bug");
                    }
                    done.lock().unwrap().push(event.id);
                    Ok(())
                }
            })))
            .await
            .unwrap();
        let router = Arc::new(Router::new(
            Arc::new(dispatcher),
            Arc::new(ConversationOrchestrator::new()),
        ));
        let pool = WorkerPool::spawn(router, 1, 8, None);

        pool.submit(text_event(1, 5, "boom")).await.unwrap();
        pool.submit(text_event(2, 5, "ok")).await.unwrap();
        pool.shutdown().await;

        assert_eq!(*done.lock().unwrap(), vec![2]);
    }
}
