//! Adapters from Bot API wire types to dbot_core types.

use chrono::{DateTime, Utc};
use dbot_core::{Chat, Event, Message, ToCoreMessage, ToCoreUser, User};

use crate::wire::{WireMessage, WireUpdate, WireUser};

/// Wraps a wire user for conversion to core [`User`].
pub struct TelegramUserWrapper<'a>(pub &'a WireUser);

impl<'a> ToCoreUser for TelegramUserWrapper<'a> {
    fn to_core(&self) -> User {
        User {
            id: self.0.id,
            is_bot: self.0.is_bot,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

/// Wraps a wire message for conversion to core [`Message`].
pub struct TelegramMessageWrapper<'a>(pub &'a WireMessage);

impl<'a> ToCoreMessage for TelegramMessageWrapper<'a> {
    fn to_core(&self) -> Message {
        Message {
            id: self.0.message_id,
            user: self.0.from.as_ref().map(|u| TelegramUserWrapper(u).to_core()),
            chat: Chat {
                id: self.0.chat.id,
                chat_type: self.0.chat.chat_type.clone(),
            },
            text: self.0.text.clone(),
            created_at: DateTime::from_timestamp(self.0.date, 0).unwrap_or_else(Utc::now),
        }
    }
}

/// Message updates become [`dbot_core::EventKind::Message`]; every other kind is carried by name.
pub fn update_to_event(update: &WireUpdate) -> Event {
    match &update.message {
        Some(message) => Event::message(update.update_id, TelegramMessageWrapper(message).to_core()),
        None => Event::other(update.update_id, update.kind()),
    }
}
