//! Bot configuration: BaseConfig (Telegram + log) + PollingConfig + DispatchConfig.

mod base;
mod bot_config;
mod polling;


pub use base::{BaseConfig, UpdateMethod};
pub use bot_config::BotConfig;
pub use polling::{DispatchConfig, PollingConfig, DEFAULT_DISPATCH_WORKERS};
