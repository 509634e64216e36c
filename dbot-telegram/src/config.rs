//! Minimal transport config: token, API base URL and the default update allow-list.

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Connection settings for [`crate::TelegramTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Base URL without the `/bot<token>` part.
    pub api_url: String,
    /// Used for webhooks registered without their own allow-list.
    pub allowed_updates: Vec<String>,
}

impl TelegramConfig {
    /// Uses the given token with the public API URL and an empty allow-list.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            allowed_updates: Vec::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_allowed_updates(mut self, allowed_updates: Vec<String>) -> Self {
        self.allowed_updates = allowed_updates;
        self
    }

    /// `{api_url}/bot{token}/{method}`.
    pub(crate) fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }
}
