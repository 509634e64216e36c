//! # Dispatcher
//!
//! Routes one event to a single piece of application logic: the handler registered for the
//! message's command, else the default handler, else nothing. The table is populated at setup
//! and read concurrently by delivery workers during steady-state dispatch.

use dbot_core::{Event, Handler, RegistrationError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// What [`Dispatcher::route`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event carries no message payload.
    NoMessage,
    /// The handler registered for this command ran.
    Command(String),
    /// No command matched; the default handler ran.
    Default,
    /// No command matched and no default handler is registered.
    Unhandled,
}

/// Command → handler table plus a set-once default handler.
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    default_handler: RwLock<Option<Arc<dyn Handler>>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher (no handlers, no default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `command`. Rejects empty commands and commands that already have a
    /// handler; the existing binding is kept.
    pub async fn register_handler(
        &self,
        command: &str,
        handler: Arc<dyn Handler>,
    ) -> std::result::Result<(), RegistrationError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(RegistrationError::EmptyCommand);
        }

        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(command) {
            return Err(RegistrationError::DuplicateHandler(command.to_string()));
        }
        handlers.insert(command.to_string(), handler);
        info!(command = %command, "step: handler registered");
        Ok(())
    }

    /// Sets the default handler. Set-once: a second call fails and keeps the first handler.
    pub async fn register_default_handler(
        &self,
        handler: Arc<dyn Handler>,
    ) -> std::result::Result<(), RegistrationError> {
        let mut default_handler = self.default_handler.write().await;
        if default_handler.is_some() {
            return Err(RegistrationError::DefaultHandlerExists);
        }
        *default_handler = Some(handler);
        info!("step: default handler registered");
        Ok(())
    }

    /// Returns true when `command` has a handler.
    pub async fn has_handler(&self, command: &str) -> bool {
        self.handlers.read().await.contains_key(command)
    }

    /// Registered commands, sorted.
    pub async fn commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        commands.sort();
        commands
    }

    /// Routes one event. Handler errors are returned, not swallowed. Locks are released before
    /// the handler runs so slow handlers never block registration or other workers.
    #[instrument(skip(self, event), fields(update_id = event.id))]
    pub async fn route(&self, event: &Event) -> Result<RouteOutcome> {
        let Some(message) = event.as_message() else {
            debug!("step: non-message event ignored");
            return Ok(RouteOutcome::NoMessage);
        };

        if let Some(command) = message.command() {
            let handler = self.handlers.read().await.get(command).cloned();
            if let Some(handler) = handler {
                info!(
                    chat_id = message.chat.id,
                    command = %command,
                    "step: command handler"
                );
                handler.handle(event).await?;
                return Ok(RouteOutcome::Command(command.to_string()));
            }
        }

        let default_handler = self.default_handler.read().await.clone();
        match default_handler {
            Some(handler) => {
                debug!(chat_id = message.chat.id, "step: default handler");
                handler.handle(event).await?;
                Ok(RouteOutcome::Default)
            }
            None => {
                debug!(chat_id = message.chat.id, "step: no handler matched");
                Ok(RouteOutcome::Unhandled)
            }
        }
    }
}

// Integration tests live in tests/dispatcher_test.rs
