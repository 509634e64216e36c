//! Base config: Telegram connection, update method and logging. Loaded from env.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use dbot_core::DbotError;
use dbot_telegram::DEFAULT_API_URL;

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMethod {
    /// Poll with `getUpdates`.
    #[default]
    GetUpdates,
    /// The platform pushes updates to a registered webhook.
    Webhook,
}

impl FromStr for UpdateMethod {
    type Err = DbotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "getUpdates" => Ok(UpdateMethod::GetUpdates),
            "webhook" => Ok(UpdateMethod::Webhook),
            other => Err(DbotError::Config(format!(
                "invalid update method '{}', expected getUpdates or webhook",
                other
            ))),
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMethod::GetUpdates => write!(f, "getUpdates"),
            UpdateMethod::Webhook => write!(f, "webhook"),
        }
    }
}

/// Base config: Telegram-related and logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfig {
    /// BOT_TOKEN
    pub bot_token: String,
    /// TELEGRAM_API_URL
    pub telegram_api_url: String,
    /// UPDATE_METHOD
    pub update_method: UpdateMethod,
    /// WEBHOOK_URL, used by the set-webhook command
    pub webhook_url: Option<String>,
    /// Log file path
    pub log_file: String,
}

impl BaseConfig {
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            telegram_api_url: DEFAULT_API_URL.to_string(),
            update_method: UpdateMethod::default(),
            webhook_url: None,
            log_file: "logs/dbot.log".to_string(),
        }
    }

    /// Load from environment variables. `token` overrides BOT_TOKEN if provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN").context("BOT_TOKEN not set")?,
        };
        let telegram_api_url =
            env::var("TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let update_method = match env::var("UPDATE_METHOD") {
            Ok(method) => method.parse()?,
            Err(_) => UpdateMethod::default(),
        };
        let webhook_url = env::var("WEBHOOK_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/dbot.log".to_string());

        Ok(Self {
            bot_token,
            telegram_api_url,
            update_method,
            webhook_url,
            log_file,
        })
    }

    /// Token must be non-empty; the API URL must parse.
    pub fn validate(&self) -> std::result::Result<(), DbotError> {
        if self.bot_token.trim().is_empty() {
            return Err(DbotError::Config("BOT_TOKEN is empty".to_string()));
        }
        if reqwest::Url::parse(&self.telegram_api_url).is_err() {
            return Err(DbotError::Config(format!(
                "TELEGRAM_API_URL is set but not a valid URL: {}",
                self.telegram_api_url
            )));
        }
        Ok(())
    }
}
