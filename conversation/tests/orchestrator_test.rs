//! Integration tests for [`conversation::ConversationOrchestrator`].
//!
//! Covers: last-write-wins registration, deregistration no-ops, error propagation without
//! deregistration, default response and default sequence fallbacks, self-finishing sequences and
//! concurrent registration for one chat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use conversation::{
    ActiveSequenceRegistry, ConversationOrchestrator, ConversationOutcome, Orchestrator,
};
use dbot_core::{
    ActionResult, Chat, DbotError, Event, FetchRequest, HandlerError, Message, OutgoingMessage,
    Result, Sequence, Transport, TransportError, Webhook,
};
use mockall::mock;
use mockall::predicate::eq;

mock! {
    pub Api {}

    #[async_trait]
    impl Transport for Api {
        async fn fetch_events(&self, request: &FetchRequest) -> std::result::Result<Vec<Event>, TransportError>;
        async fn send_message(&self, message: &OutgoingMessage) -> std::result::Result<ActionResult, TransportError>;
        async fn register_webhook(&self, webhook: &Webhook) -> std::result::Result<bool, TransportError>;
        async fn delete_webhook(&self, drop_pending_updates: bool) -> std::result::Result<bool, TransportError>;
    }
}

fn create_test_event(id: i64, chat_id: i64, text: &str) -> Event {
    Event::message(
        id,
        Message {
            id: 1000 + id,
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

/// Sequence that records every call as `"<name>:<method>"` into a shared log.
struct RecordingSequence {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_process: bool,
    fail_start: bool,
}

impl RecordingSequence {
    fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
            fail_process: false,
            fail_start: false,
        }
    }

    fn record(&self, method: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, method));
    }
}

#[async_trait]
impl Sequence for RecordingSequence {
    async fn start(&self, _event: &Event) -> Result<()> {
        self.record("start");
        if self.fail_start {
            return Err(DbotError::Handler(HandlerError::State("cannot start".to_string())));
        }
        Ok(())
    }

    async fn process(&self, _event: &Event) -> Result<()> {
        self.record("process");
        if self.fail_process {
            return Err(DbotError::Handler(HandlerError::Failed("delegation failed".to_string())));
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.record("finish");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// **Test: Second registration for a chat wins; only its `process` runs.**
///
/// **Setup:** register seqA then seqB for chat 1.
/// **Action:** handle a message for chat 1.
/// **Expected:** seqB processes it; seqA is never called (not even finish).
#[tokio::test]
async fn test_register_overrides_existing_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = ConversationOrchestrator::new();

    orchestrator
        .register_active_sequence(1, Arc::new(RecordingSequence::new("seqA", log.clone())))
        .await
        .unwrap();
    orchestrator
        .register_active_sequence(1, Arc::new(RecordingSequence::new("seqB", log.clone())))
        .await
        .unwrap();

    let outcome = orchestrator.handle(&create_test_event(1, 1, "hi")).await.unwrap();

    assert_eq!(outcome, ConversationOutcome::Sequence("seqB".to_string()));
    assert_eq!(entries(&log), vec!["seqB:process".to_string()]);
    assert_eq!(orchestrator.registry().len().await, 1);
}

/// **Test: Deregistering a chat without a sequence succeeds and changes nothing.**
#[tokio::test]
async fn test_deregister_without_sequence_is_noop() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = ConversationOrchestrator::new();
    orchestrator
        .register_active_sequence(2, Arc::new(RecordingSequence::new("other", log)))
        .await
        .unwrap();

    orchestrator.deregister_active_sequence(1).await.unwrap();

    assert!(!orchestrator.has_active_sequence(1).await);
    assert!(orchestrator.has_active_sequence(2).await);
}

/// **Test: Register then deregister returns the chat to no active sequence.**
#[tokio::test]
async fn test_can_deregister_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = ConversationOrchestrator::new();
    orchestrator
        .register_active_sequence(1, Arc::new(RecordingSequence::new("seq", log.clone())))
        .await
        .unwrap();

    orchestrator.deregister_active_sequence(1).await.unwrap();
    let outcome = orchestrator.handle(&create_test_event(1, 1, "hi")).await.unwrap();

    assert_eq!(outcome, ConversationOutcome::Unhandled);
    assert!(entries(&log).is_empty());
}

/// **Test: A failing `process` is returned under the sequence's name and the sequence stays active.**
#[tokio::test]
async fn test_process_error_propagates_without_deregistering() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sequence = RecordingSequence::new("flaky", log.clone());
    sequence.fail_process = true;

    let orchestrator = ConversationOrchestrator::new();
    orchestrator
        .register_active_sequence(1, Arc::new(sequence))
        .await
        .unwrap();

    let result = orchestrator.handle(&create_test_event(1, 1, "hi")).await;

    assert!(matches!(
        result,
        Err(DbotError::Sequence { ref name, ref reason })
            if name == "flaky" && reason.contains("delegation failed")
    ));
    assert!(orchestrator.has_active_sequence(1).await);
}

/// **Test: `process_active` forwards only when the chat has an active sequence.**
#[tokio::test]
async fn test_process_active_only_with_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = ConversationOrchestrator::new();

    let none = orchestrator
        .process_active(2, &create_test_event(1, 2, "hi"))
        .await
        .unwrap();
    orchestrator
        .register_active_sequence(2, Arc::new(RecordingSequence::new("seq", log.clone())))
        .await
        .unwrap();
    let some = orchestrator
        .process_active(2, &create_test_event(2, 2, "hi"))
        .await
        .unwrap();

    assert_eq!(none, None);
    assert_eq!(some, Some(ConversationOutcome::Sequence("seq".to_string())));
    assert_eq!(entries(&log), vec!["seq:process".to_string()]);
}

/// **Test: Non-message events reach neither sequences nor defaults.**
#[tokio::test]
async fn test_non_message_event_is_ignored() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let api = MockApi::new();
    let orchestrator =
        ConversationOrchestrator::new().with_default_response(Arc::new(api), "default response");
    orchestrator
        .register_active_sequence(1, Arc::new(RecordingSequence::new("seq", log.clone())))
        .await
        .unwrap();

    let outcome = orchestrator
        .handle(&Event::other(3, "edited_message"))
        .await
        .unwrap();

    assert_eq!(outcome, ConversationOutcome::NoMessage);
    assert!(entries(&log).is_empty());
}

/// **Test: Without an active sequence the default response is sent to the chat.**
#[tokio::test]
async fn test_default_response_sent() {
    let mut api = MockApi::new();
    api.expect_send_message()
        .with(eq(OutgoingMessage::text(7, "default response")))
        .times(1)
        .returning(|_| {
            Ok(ActionResult {
                successful: true,
                description: String::new(),
            })
        });

    let orchestrator =
        ConversationOrchestrator::new().with_default_response(Arc::new(api), "default response");

    let outcome = orchestrator.handle(&create_test_event(1, 7, "hi")).await.unwrap();

    assert_eq!(outcome, ConversationOutcome::DefaultResponse);
}

/// **Test: A transport failure while sending the default response is returned.**
#[tokio::test]
async fn test_default_response_send_failure_propagates() {
    let mut api = MockApi::new();
    api.expect_send_message()
        .times(1)
        .returning(|_| Err(TransportError::Request("send message failed".to_string())));

    let orchestrator =
        ConversationOrchestrator::new().with_default_response(Arc::new(api), "default response");

    let result = orchestrator.handle(&create_test_event(1, 7, "hi")).await;

    assert!(matches!(
        result,
        Err(DbotError::Transport(TransportError::Request(ref m))) if m == "send message failed"
    ));
}

/// **Test: An unsuccessful send result is logged, not an error.**
#[tokio::test]
async fn test_default_response_unsuccessful_result_is_not_error() {
    let mut api = MockApi::new();
    api.expect_send_message().times(1).returning(|_| {
        Ok(ActionResult {
            successful: false,
            description: "Bad Request: chat not found".to_string(),
        })
    });

    let orchestrator =
        ConversationOrchestrator::new().with_default_response(Arc::new(api), "default response");

    let outcome = orchestrator.handle(&create_test_event(1, 7, "hi")).await.unwrap();

    assert_eq!(outcome, ConversationOutcome::DefaultResponse);
}

/// **Test: The default sequence is created, registered and started; later messages go to it.**
#[tokio::test]
async fn test_default_sequence_started_then_processes() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let created = Arc::new(AtomicUsize::new(0));
    let factory_log = log.clone();
    let factory_created = created.clone();
    let orchestrator = ConversationOrchestrator::new().with_default_sequence(Arc::new(
        move |_event: &Event| -> Arc<dyn Sequence> {
            factory_created.fetch_add(1, Ordering::SeqCst);
            Arc::new(RecordingSequence::new("onboarding", factory_log.clone()))
        },
    ));

    let first = orchestrator.handle(&create_test_event(1, 5, "hi")).await.unwrap();
    let second = orchestrator.handle(&create_test_event(2, 5, "Ada")).await.unwrap();

    assert_eq!(first, ConversationOutcome::DefaultSequence("onboarding".to_string()));
    assert_eq!(second, ConversationOutcome::Sequence("onboarding".to_string()));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(
        entries(&log),
        vec!["onboarding:start".to_string(), "onboarding:process".to_string()]
    );
}

/// **Test: A default sequence whose start fails is not left registered.**
#[tokio::test]
async fn test_default_sequence_start_failure_not_registered() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory_log = log.clone();
    let orchestrator = ConversationOrchestrator::new().with_default_sequence(Arc::new(
        move |_event: &Event| -> Arc<dyn Sequence> {
            let mut sequence = RecordingSequence::new("broken", factory_log.clone());
            sequence.fail_start = true;
            Arc::new(sequence)
        },
    ));

    let result = orchestrator.handle(&create_test_event(1, 5, "hi")).await;

    assert!(matches!(
        result,
        Err(DbotError::Sequence { ref name, ref reason })
            if name == "broken" && reason.contains("cannot start")
    ));
    assert!(!orchestrator.has_active_sequence(5).await);
}

/// **Test: `finish_active_sequence` deregisters and calls finish exactly once.**
#[tokio::test]
async fn test_finish_active_sequence() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = ConversationOrchestrator::new();
    orchestrator
        .register_active_sequence(1, Arc::new(RecordingSequence::new("seq", log.clone())))
        .await
        .unwrap();

    assert!(orchestrator.finish_active_sequence(1).await.unwrap());
    assert!(!orchestrator.finish_active_sequence(1).await.unwrap());

    assert_eq!(entries(&log), vec!["seq:finish".to_string()]);
    assert!(!orchestrator.has_active_sequence(1).await);
}

/// **Test: A sequence can deregister itself through a shared registry.**
///
/// **Setup:** a two-step sequence that deregisters after its second message.
/// **Expected:** third message is unhandled.
#[tokio::test]
async fn test_sequence_deregisters_itself() {
    struct TwoStep {
        chat_id: i64,
        steps: AtomicUsize,
        registry: ActiveSequenceRegistry,
    }

    #[async_trait]
    impl Sequence for TwoStep {
        async fn start(&self, _event: &Event) -> Result<()> {
            Ok(())
        }
        async fn process(&self, _event: &Event) -> Result<()> {
            if self.steps.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                self.registry.deregister(self.chat_id).await;
            }
            Ok(())
        }
        async fn finish(&self) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "two-step"
        }
    }

    let registry = ActiveSequenceRegistry::new();
    let orchestrator = ConversationOrchestrator::with_registry(registry.clone());
    orchestrator
        .register_active_sequence(
            3,
            Arc::new(TwoStep {
                chat_id: 3,
                steps: AtomicUsize::new(0),
                registry,
            }),
        )
        .await
        .unwrap();

    orchestrator.handle(&create_test_event(1, 3, "one")).await.unwrap();
    orchestrator.handle(&create_test_event(2, 3, "two")).await.unwrap();
    let third = orchestrator.handle(&create_test_event(3, 3, "three")).await.unwrap();

    assert_eq!(third, ConversationOutcome::Unhandled);
}

/// **Test: Concurrent registrations for one chat leave exactly one entry.**
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_entry() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orchestrator = Arc::new(ConversationOrchestrator::new());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let orchestrator = orchestrator.clone();
        let log = log.clone();
        tasks.push(tokio::spawn(async move {
            orchestrator
                .register_active_sequence(
                    1,
                    Arc::new(RecordingSequence::new(&format!("seq{}", i), log)),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(orchestrator.registry().len().await, 1);
}
