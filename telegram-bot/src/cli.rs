//! CLI parser and config loading.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::BotConfig;

#[derive(Parser)]
#[command(name = "dbot")]
#[command(about = "Telegram Bot CLI: run, set-webhook, delete-webhook", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot with getUpdates polling (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Register a webhook (requires UPDATE_METHOD=webhook; url defaults to WEBHOOK_URL).
    SetWebhook {
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Drop updates that are waiting on the server.
        #[arg(long)]
        drop_pending: bool,
    },
    /// Delete the registered webhook so the bot can poll again.
    DeleteWebhook {
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        drop_pending: bool,
    },
}

/// Load BotConfig from environment. If `token` is provided it overrides BOT_TOKEN.
pub fn load_config(token: Option<String>) -> Result<BotConfig> {
    BotConfig::load(token)
}
