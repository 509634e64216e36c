//! # poller
//!
//! Repeatedly retrieves new events from a [`dbot_core::Transport`] and delivers them, in
//! identifier order, to one output stream. The cursor (next offset) is advanced only by the
//! scheduling side and only past events that were accepted by the output stream, so a failed
//! fetch is simply retried with the same cursor on the next tick.

mod config;
mod poller;
mod schedule;

pub use config::{
    PollerConfig, PollerError, DEFAULT_CRON_TIMEZONE,
    DEFAULT_POLLING_INTERVAL_SECS, DEFAULT_POLLING_TIMEOUT_SECS, DEFAULT_UPDATES_LIMIT,
    MAX_UPDATES_LIMIT,
};
pub use poller::{advance_cursor, order_batch, Poller, TickReport};
pub use schedule::Schedule;
