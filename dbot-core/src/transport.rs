//! The boundary with the messaging platform.
//!
//! [`Transport`] is a single request/response exchange per call; the core never sees the wire
//! format. Production code uses the Bot API implementation in dbot-telegram; tests substitute a
//! fake or a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::types::Event;

/// Parameters of one fetch-updates call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    /// Cursor: the first update id not yet retrieved.
    pub offset: i64,
    /// Batch size limit.
    pub limit: u32,
    /// Long-poll timeout in seconds.
    #[serde(rename = "timeout")]
    pub timeout_secs: u32,
    /// Update kinds to receive; empty means all kinds.
    pub allowed_updates: Vec<String>,
}

/// A text message to send to a chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_notification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

impl OutgoingMessage {
    /// Plain text message for `chat_id`.
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            ..Self::default()
        }
    }
}

/// An endpoint for receiving pushed updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    /// `None` means "use the configured allow-list".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
    pub drop_pending_updates: bool,
}

/// Outcome of an outbound action as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionResult {
    pub successful: bool,
    pub description: String,
}

/// Request/response exchanges with the messaging platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches updates starting at `request.offset`. Order of the returned events is not guaranteed.
    async fn fetch_events(&self, request: &FetchRequest) -> Result<Vec<Event>, TransportError>;

    /// Sends a message to a chat.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<ActionResult, TransportError>;

    /// Registers a webhook. Returns the platform's result, true on success.
    async fn register_webhook(&self, webhook: &Webhook) -> Result<bool, TransportError>;

    /// Deletes the registered webhook.
    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, TransportError>;
}
