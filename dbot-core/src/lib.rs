//! # dbot-core
//!
//! Core types and traits for the bot runtime: [`Event`], [`Message`], [`Handler`], [`Sequence`],
//! [`Transport`], the error taxonomy and tracing initialization. Transport-agnostic; used by
//! dispatcher, conversation, poller and dbot-telegram.

pub mod error;
pub mod logger;
pub mod transport;
pub mod types;

pub use error::{DbotError, HandlerError, RegistrationError, Result, TransportError};
pub use logger::init_tracing;
pub use transport::{ActionResult, FetchRequest, OutgoingMessage, Transport, Webhook};
pub use types::{
    handler_fn, Chat, Event, EventKind, FnHandler, Handler, Message, Sequence, ToCoreMessage,
    ToCoreUser, User,
};
