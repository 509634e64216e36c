//! Bot API JSON shapes. Only the fields the runtime reads are modelled; everything else in an
//! update is kept as raw JSON so the update kind can still be named.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
}

/// One entry of a `getUpdates` result or a webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUpdate {
    pub update_id: i64,
    pub message: Option<WireMessage>,
    /// Payload of any other update kind, keyed by its wire name.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl WireUpdate {
    /// Wire key of the payload (`message`, `callback_query`, ...).
    pub fn kind(&self) -> &str {
        if self.message.is_some() {
            return "message";
        }
        self.rest.keys().next().map(String::as_str).unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub message_id: i64,
    pub from: Option<WireUser>,
    pub chat: WireChat,
    /// Unix seconds.
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteWebhookRequest {
    pub drop_pending_updates: bool,
}
