//! # dbot-telegram
//!
//! Telegram Bot API layer: [`TelegramTransport`] implements [`dbot_core::Transport`] over
//! HTTP+JSON, wire types are adapted to core [`dbot_core::Event`]s. Handles only platform
//! connectivity; no routing, conversation or scheduling logic.

mod adapters;
mod client;
mod config;
pub mod wire;

pub use adapters::{update_to_event, TelegramMessageWrapper, TelegramUserWrapper};
pub use client::TelegramTransport;
pub use config::{TelegramConfig, DEFAULT_API_URL};

use dbot_core::{Event, TransportError};

/// Parses a pushed webhook body (a single update) into an [`Event`].
pub fn parse_update(body: &[u8]) -> Result<Event, TransportError> {
    let update: wire::WireUpdate = serde_json::from_slice(body)
        .map_err(|e| TransportError::Decode(format!("webhook update: {}", e)))?;
    Ok(update_to_event(&update))
}
