//! [`Transport`] over the Bot API: every call is a JSON POST to `{api_url}/bot{token}/{method}`.

use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    ActionResult, Event, FetchRequest, OutgoingMessage, Transport, TransportError, Webhook,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::adapters::update_to_event;
use crate::config::TelegramConfig;
use crate::wire::{ApiResponse, DeleteWebhookRequest, WireUpdate};

const GET_UPDATES: &str = "getUpdates";
const SEND_MESSAGE: &str = "sendMessage";
const SET_WEBHOOK: &str = "setWebhook";
const DELETE_WEBHOOK: &str = "deleteWebhook";

/// Default timeout for calls that do not long-poll.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Added on top of the long-poll timeout so the server answers before the client gives up.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client. Cheap to clone.
#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    config: TelegramConfig,
}

impl TelegramTransport {
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// POSTs `body` to `method` and decodes the API envelope. Non-2xx statuses are errors;
    /// `ok: false` is left for the caller to interpret.
    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.config.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Errors carry the request URL, which contains the token.
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("{} response: {}", method, e)))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    #[instrument(skip(self, request), fields(offset = request.offset))]
    async fn fetch_events(&self, request: &FetchRequest) -> Result<Vec<Event>, TransportError> {
        let timeout = Duration::from_secs(u64::from(request.timeout_secs)) + LONG_POLL_GRACE;
        let response: ApiResponse<Vec<WireUpdate>> =
            self.call(GET_UPDATES, request, Some(timeout)).await?;

        if !response.ok {
            return Err(TransportError::Api {
                code: response.error_code,
                description: response.description.unwrap_or_default(),
            });
        }

        let updates = response.result.unwrap_or_default();
        debug!(count = updates.len(), "step: getUpdates returned");
        Ok(updates.iter().map(update_to_event).collect())
    }

    #[instrument(skip(self, message), fields(chat_id = message.chat_id))]
    async fn send_message(&self, message: &OutgoingMessage) -> Result<ActionResult, TransportError> {
        let response: ApiResponse<serde_json::Value> =
            self.call(SEND_MESSAGE, message, None).await?;

        if !response.ok {
            warn!(
                error_code = ?response.error_code,
                description = ?response.description,
                "sendMessage rejected"
            );
        }
        Ok(ActionResult {
            successful: response.ok,
            description: response.description.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, webhook))]
    async fn register_webhook(&self, webhook: &Webhook) -> Result<bool, TransportError> {
        if webhook.url.trim().is_empty() {
            return Err(TransportError::MissingWebhookUrl);
        }

        let mut webhook = webhook.clone();
        if webhook.allowed_updates.is_none() {
            webhook.allowed_updates = Some(self.config.allowed_updates.clone());
        }

        let response: ApiResponse<bool> = self.call(SET_WEBHOOK, &webhook, None).await?;
        debug!(ok = response.ok, description = ?response.description, "step: setWebhook returned");
        Ok(response.ok)
    }

    #[instrument(skip(self))]
    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, TransportError> {
        let body = DeleteWebhookRequest {
            drop_pending_updates,
        };
        let response: ApiResponse<bool> = self.call(DELETE_WEBHOOK, &body, None).await?;
        debug!(ok = response.ok, description = ?response.description, "step: deleteWebhook returned");
        Ok(response.ok)
    }
}
