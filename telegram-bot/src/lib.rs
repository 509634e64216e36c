//! # Telegram bot application
//!
//! Wires dispatcher, conversation, poller and the Bot API transport into [`TelegramBot`]. Loads
//! config from env, routes every event through [`Router`] and fans polled events out to
//! [`WorkerPool`] workers.

pub mod cli;
pub mod config;
pub mod handlers;
pub mod router;
pub mod runner;
pub mod workers;

pub use cli::{load_config, Cli, Commands};
pub use config::{BaseConfig, BotConfig, DispatchConfig, PollingConfig, UpdateMethod};
pub use handlers::{GreetingHandler, SurveyHandler, SurveySequence};
pub use router::{Routed, Router};
pub use runner::{init_logging, run_bot, TelegramBot};
pub use workers::WorkerPool;

pub use dbot_core::{
    handler_fn, ActionResult, Chat, DbotError, Event, EventKind, Handler, Message,
    OutgoingMessage, Result, Sequence, Transport, TransportError, User, Webhook,
};
