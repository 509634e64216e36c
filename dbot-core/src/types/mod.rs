//! Core types: user, chat, message, event, and the Handler and Sequence traits.
//!
//! Types are split into one file per main type.

mod chat;
mod event;
mod handler;
mod message;
mod sequence;
mod user;

pub use chat::Chat;
pub use event::{Event, EventKind};
pub use handler::{handler_fn, FnHandler, Handler, ToCoreMessage, ToCoreUser};
pub use message::Message;
pub use sequence::Sequence;
pub use user::User;
