//! Error types for the bot core.
//!
//! [`DbotError`] is the top-level error. [`TransportError`] covers the request/response exchange
//! with the messaging platform, [`RegistrationError`] covers handler table conflicts and
//! [`HandlerError`] is what application handlers usually fail with.

use thiserror::Error;

/// Top-level error for dbot (config, transport, registration, scheduling, handler, sequence, IO).
#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Sequence '{name}' failed: {reason}")]
    Sequence { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a single exchange with the messaging platform. All of them are recoverable:
/// the poller logs them and retries on its next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response code: {code}, {body}")]
    Status { code: u16, body: String },

    #[error("api returned an error (code {code:?}): {description}")]
    Api {
        code: Option<i32>,
        description: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("a url is required to register a webhook")]
    MissingWebhookUrl,
}

/// Handler table conflicts. The table is left unchanged when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("empty command")]
    EmptyCommand,

    #[error("a handler already exists for command {0}")]
    DuplicateHandler(String),

    #[error("a default handler is already registered")]
    DefaultHandlerExists,
}

/// Errors produced by handlers and sequences.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No text in message")]
    NoText,

    #[error("State error: {0}")]
    State(String),

    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Result type for core operations; uses [`DbotError`].
pub type Result<T> = std::result::Result<T, DbotError>;
