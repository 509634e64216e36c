//! Message type for the core model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{chat::Chat, user::User};

/// A single inbound message. Content is opaque to routing except for the command token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Sender; absent for channel posts.
    pub user: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Command string used for routing: the first whitespace-separated token of the text with any
    /// `@botname` suffix removed. `None` when there is no text.
    ///
    /// `"/start@my_bot now"` yields `"/start"`; `"hello there"` yields `"hello"`.
    pub fn command(&self) -> Option<&str> {
        let token = self.text.as_deref()?.split_whitespace().next()?;
        match token.split_once('@') {
            Some((command, _bot)) if !command.is_empty() => Some(command),
            _ => Some(token),
        }
    }

    /// Chat id shortcut.
    pub fn chat_id(&self) -> i64 {
        self.chat.id
    }
}
