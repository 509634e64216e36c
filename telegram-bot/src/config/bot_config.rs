//! BotConfig: BaseConfig + PollingConfig + DispatchConfig. Use load() for env-based loading.

use anyhow::Result;
use dbot_core::DbotError;
use poller::PollerConfig;

use super::{BaseConfig, DispatchConfig, PollingConfig, UpdateMethod};

/// Bot config. Use BotConfig::load() for env-based loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub base: BaseConfig,
    pub polling: PollingConfig,
    pub dispatch: DispatchConfig,
}

impl BotConfig {
    /// Defaults for everything but the token.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            base: BaseConfig::with_token(bot_token),
            polling: PollingConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }

    /// Load full config from environment variables. If `token` is provided it overrides BOT_TOKEN.
    /// Call validate() after load to check config before init.
    pub fn load(token: Option<String>) -> Result<Self> {
        Ok(Self {
            base: BaseConfig::load(token)?,
            polling: PollingConfig::load()?,
            dispatch: DispatchConfig::load()?,
        })
    }

    /// Validate config. Call after load() to fail fast before init.
    pub fn validate(&self) -> std::result::Result<(), DbotError> {
        self.base.validate()?;
        if self.base.update_method == UpdateMethod::GetUpdates {
            self.poller_config().validate()?;
        }
        if self.dispatch.workers == 0 {
            return Err(DbotError::Config(
                "DISPATCH_WORKERS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        self.polling.to_poller_config()
    }

    pub fn bot_token(&self) -> &str {
        &self.base.bot_token
    }
    pub fn telegram_api_url(&self) -> &str {
        &self.base.telegram_api_url
    }
    pub fn update_method(&self) -> UpdateMethod {
        self.base.update_method
    }
    pub fn webhook_url(&self) -> Option<&str> {
        self.base.webhook_url.as_deref()
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn allowed_updates(&self) -> &[String] {
        &self.polling.allowed_updates
    }
}
