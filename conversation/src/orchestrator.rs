//! Conversation orchestrator: routes a chat's messages to its active sequence.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{DbotError, Event, Handler, OutgoingMessage, Result, Sequence, Transport};
use tracing::{debug, info, instrument, warn};

use crate::registry::ActiveSequenceRegistry;

/// Registration surface handed to sequences so they can end themselves.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Registers `sequence` as the active sequence for the chat. Always succeeds; an existing
    /// sequence for the chat is displaced without notification.
    async fn register_active_sequence(
        &self,
        chat_id: i64,
        sequence: Arc<dyn Sequence>,
    ) -> Result<()>;

    /// Clears the active sequence for the chat. No-op when there is none.
    async fn deregister_active_sequence(&self, chat_id: i64) -> Result<()>;
}

/// Builds a fresh sequence for a chat that has none.
pub trait SequenceFactory: Send + Sync {
    fn create(&self, event: &Event) -> Arc<dyn Sequence>;
}

impl<F> SequenceFactory for F
where
    F: Fn(&Event) -> Arc<dyn Sequence> + Send + Sync,
{
    fn create(&self, event: &Event) -> Arc<dyn Sequence> {
        self(event)
    }
}

/// What to do with a message when its chat has no active sequence.
#[derive(Clone, Default)]
pub enum DefaultAction {
    /// Nothing.
    #[default]
    None,
    /// Reply with a fixed text through the transport.
    Response {
        transport: Arc<dyn Transport>,
        text: String,
    },
    /// Create, register and start a new sequence for the chat.
    Sequence(Arc<dyn SequenceFactory>),
}

/// What [`ConversationOrchestrator::handle`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    NoMessage,
    /// Forwarded to the chat's active sequence (by name).
    Sequence(String),
    DefaultResponse,
    /// A default sequence (by name) was registered and started.
    DefaultSequence(String),
    Unhandled,
}

/// Keeps track of the conversation context per chat and delegates each message to the chat's
/// active sequence. Sequences manage their own state and decide when they are done.
#[derive(Clone, Default)]
pub struct ConversationOrchestrator {
    registry: ActiveSequenceRegistry,
    default_action: DefaultAction,
}

impl ConversationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing registry (shared with sequences or other orchestrators).
    pub fn with_registry(registry: ActiveSequenceRegistry) -> Self {
        Self {
            registry,
            default_action: DefaultAction::None,
        }
    }

    /// Replies with `text` when a chat has no active sequence.
    pub fn with_default_response(
        mut self,
        transport: Arc<dyn Transport>,
        text: impl Into<String>,
    ) -> Self {
        self.default_action = DefaultAction::Response {
            transport,
            text: text.into(),
        };
        self
    }

    /// Starts a sequence from `factory` when a chat has no active sequence.
    pub fn with_default_sequence(mut self, factory: Arc<dyn SequenceFactory>) -> Self {
        self.default_action = DefaultAction::Sequence(factory);
        self
    }

    pub fn registry(&self) -> &ActiveSequenceRegistry {
        &self.registry
    }

    pub async fn has_active_sequence(&self, chat_id: i64) -> bool {
        self.registry.contains(chat_id).await
    }

    pub async fn active_sequence(&self, chat_id: i64) -> Option<Arc<dyn Sequence>> {
        self.registry.get(chat_id).await
    }

    /// Deregisters the chat's sequence and calls its `finish`. Returns false when the chat had
    /// no active sequence.
    pub async fn finish_active_sequence(&self, chat_id: i64) -> Result<bool> {
        match self.registry.deregister(chat_id).await {
            Some(sequence) => {
                info!(chat_id, sequence = %sequence.name(), "step: finishing sequence");
                sequence.finish().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forwards `event` to the chat's active sequence, if there is one. The registry is read
    /// once, so the sequence that is looked up is the one that processes the event. Returns
    /// `None` when the chat has no active sequence.
    pub async fn process_active(
        &self,
        chat_id: i64,
        event: &Event,
    ) -> Result<Option<ConversationOutcome>> {
        let Some(sequence) = self.registry.get(chat_id).await else {
            return Ok(None);
        };
        let name = sequence.name().to_string();
        debug!(chat_id, sequence = %name, "step: delegating to active sequence");
        sequence
            .process(event)
            .await
            .map_err(|e| sequence_error(&name, e))?;
        Ok(Some(ConversationOutcome::Sequence(name)))
    }

    /// Handles one event. A chat with an active sequence gets `process`; errors are propagated
    /// and the sequence stays registered. Otherwise the default action runs, if any.
    #[instrument(skip(self, event), fields(update_id = event.id))]
    pub async fn handle(&self, event: &Event) -> Result<ConversationOutcome> {
        let Some(chat_id) = event.chat_id() else {
            debug!("step: non-message event ignored");
            return Ok(ConversationOutcome::NoMessage);
        };

        if let Some(outcome) = self.process_active(chat_id, event).await? {
            return Ok(outcome);
        }

        match &self.default_action {
            DefaultAction::None => {
                debug!(chat_id, "step: no active sequence, no default");
                Ok(ConversationOutcome::Unhandled)
            }
            DefaultAction::Response { transport, text } => {
                let result = transport
                    .send_message(&OutgoingMessage::text(chat_id, text.clone()))
                    .await
                    .map_err(|e| {
                        warn!(chat_id, error = %e, "failed to send default response");
                        DbotError::Transport(e)
                    })?;
                if !result.successful {
                    warn!(
                        chat_id,
                        description = %result.description,
                        "send message result was false"
                    );
                }
                Ok(ConversationOutcome::DefaultResponse)
            }
            DefaultAction::Sequence(factory) => {
                let sequence = factory.create(event);
                let name = sequence.name().to_string();
                info!(chat_id, sequence = %name, "step: starting default sequence");
                self.registry.register(chat_id, sequence.clone()).await;
                if let Err(e) = sequence.start(event).await {
                    // A sequence that failed to start never became active.
                    self.registry.deregister_if_current(chat_id, &sequence).await;
                    return Err(sequence_error(&name, e));
                }
                Ok(ConversationOutcome::DefaultSequence(name))
            }
        }
    }
}

/// Attaches the sequence name to a failure from `start` or `process`.
fn sequence_error(name: &str, err: DbotError) -> DbotError {
    DbotError::Sequence {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl Orchestrator for ConversationOrchestrator {
    async fn register_active_sequence(
        &self,
        chat_id: i64,
        sequence: Arc<dyn Sequence>,
    ) -> Result<()> {
        let name = sequence.name().to_string();
        if let Some(displaced) = self.registry.register(chat_id, sequence).await {
            debug!(chat_id, displaced = %displaced.name(), "step: active sequence replaced");
        }
        info!(chat_id, sequence = %name, "step: active sequence registered");
        Ok(())
    }

    async fn deregister_active_sequence(&self, chat_id: i64) -> Result<()> {
        if let Some(sequence) = self.registry.deregister(chat_id).await {
            info!(chat_id, sequence = %sequence.name(), "step: active sequence deregistered");
        }
        Ok(())
    }
}

/// Lets the orchestrator be installed as the dispatcher's default handler.
#[async_trait]
impl Handler for ConversationOrchestrator {
    async fn handle(&self, event: &Event) -> Result<()> {
        ConversationOrchestrator::handle(self, event).await.map(|_| ())
    }
}
