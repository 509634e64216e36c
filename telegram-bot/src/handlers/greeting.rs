//! Greeting handler: answers a command with a short welcome addressed to the sender.

use std::sync::Arc;

use async_trait::async_trait;
use dbot_core::{Event, Handler, Result, Transport};
use tracing::info;

use super::reply;

/// Replies `"Hello, <first name>! <text>"` to the chat the command came from.
pub struct GreetingHandler {
    transport: Arc<dyn Transport>,
    text: String,
}

impl GreetingHandler {
    pub fn new(transport: Arc<dyn Transport>, text: impl Into<String>) -> Self {
        Self {
            transport,
            text: text.into(),
        }
    }
}

#[async_trait]
impl Handler for GreetingHandler {
    async fn handle(&self, event: &Event) -> Result<()> {
        let Some(message) = event.as_message() else {
            return Ok(());
        };
        let name = message
            .user
            .as_ref()
            .and_then(|u| u.first_name.as_deref())
            .unwrap_or("there");
        info!(chat_id = message.chat_id(), "step: greeting");
        reply(
            self.transport.as_ref(),
            message.chat_id(),
            format!("Hello, {}! {}", name, self.text),
        )
        .await
    }
}
