//! Event (update) envelope.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Payload of an [`Event`]. Only messages are routed; every other kind is carried opaquely and
/// ignored by the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Message(Message),
    /// Any non-message update; `kind` is the wire key (e.g. `callback_query`).
    Other { kind: String },
}

/// One unit of inbound activity. `id` is unique and strictly increasing within a fetch.
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub kind: EventKind,
}

impl Event {
    pub fn message(id: i64, message: Message) -> Self {
        Self {
            id,
            kind: EventKind::Message(message),
        }
    }

    pub fn other(id: i64, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: EventKind::Other { kind: kind.into() },
        }
    }

    /// The message payload, if this event carries one.
    pub fn as_message(&self) -> Option<&Message> {
        match &self.kind {
            EventKind::Message(message) => Some(message),
            EventKind::Other { .. } => None,
        }
    }

    /// Chat the event belongs to; `None` for non-message events.
    pub fn chat_id(&self) -> Option<i64> {
        self.as_message().map(Message::chat_id)
    }
}
