//! Demo handlers for the `dbot` binary: a greeting command and a multi-step survey.

mod greeting;
mod survey;

pub use greeting::GreetingHandler;
pub use survey::{SurveyHandler, SurveySequence};

use dbot_core::{OutgoingMessage, Result, Transport};
use tracing::warn;

/// Sends `text` to the chat. A send the API reports as unsuccessful is logged, not an error.
pub(crate) async fn reply(transport: &dyn Transport, chat_id: i64, text: impl Into<String>) -> Result<()> {
    let result = transport
        .send_message(&OutgoingMessage::text(chat_id, text))
        .await?;
    if !result.successful {
        warn!(chat_id, description = %result.description, "send message result was false");
    }
    Ok(())
}
