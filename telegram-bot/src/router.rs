//! Single entry point for inbound events, shared by poll and webhook mode.

use std::sync::Arc;

use conversation::{ConversationOrchestrator, ConversationOutcome};
use dbot_core::{Event, Result};
use dispatcher::{Dispatcher, RouteOutcome};
use tracing::{debug, instrument};

/// Where [`Router::process_event`] sent an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    NoMessage,
    /// Handled by the conversation layer: an active sequence or the orchestrator's default.
    Conversation(ConversationOutcome),
    /// Handled by the dispatcher (a command handler or the default handler).
    Dispatched(RouteOutcome),
}

/// Orders the routing layers: active sequence, then dispatcher, then the orchestrator's
/// default fallback.
#[derive(Clone)]
pub struct Router {
    dispatcher: Arc<Dispatcher>,
    orchestrator: Arc<ConversationOrchestrator>,
}

impl Router {
    pub fn new(dispatcher: Arc<Dispatcher>, orchestrator: Arc<ConversationOrchestrator>) -> Self {
        Self {
            dispatcher,
            orchestrator,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn orchestrator(&self) -> &Arc<ConversationOrchestrator> {
        &self.orchestrator
    }

    /// Runs one event through the routing layers. A chat with an active sequence gets the event
    /// even when its text is a registered command. Handler and sequence errors are returned.
    #[instrument(skip(self, event), fields(update_id = event.id))]
    pub async fn process_event(&self, event: &Event) -> Result<Routed> {
        let Some(chat_id) = event.chat_id() else {
            debug!("step: non-message event, nothing to route");
            return Ok(Routed::NoMessage);
        };

        if let Some(outcome) = self.orchestrator.process_active(chat_id, event).await? {
            return Ok(Routed::Conversation(outcome));
        }

        match self.dispatcher.route(event).await? {
            RouteOutcome::Unhandled => {
                let outcome = self.orchestrator.handle(event).await?;
                Ok(Routed::Conversation(outcome))
            }
            outcome => Ok(Routed::Dispatched(outcome)),
        }
    }
}
