//! TelegramBot: transport, routing state, poller and delivery workers behind one lifecycle.

use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use conversation::{ConversationOrchestrator, Orchestrator, SequenceFactory};
use dbot_core::{
    init_tracing, ActionResult, DbotError, Event, Handler, OutgoingMessage, Result, Sequence,
    Transport, Webhook,
};
use dbot_telegram::{TelegramConfig, TelegramTransport};
use dispatcher::Dispatcher;
use poller::Poller;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{BotConfig, UpdateMethod};
use crate::router::{Routed, Router};
use crate::workers::{WorkerPool, WORKER_QUEUE_CAPACITY};

struct Running {
    cancel: CancellationToken,
    /// Hands the output stream back when it exits so the bot can be restarted.
    pump: JoinHandle<mpsc::Receiver<Event>>,
}

/// TelegramBot: config, transport, dispatcher and orchestrator; in poll mode also the poller and
/// its delivery workers. Handlers and sequences are registered from outside.
pub struct TelegramBot {
    config: BotConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    orchestrator: Arc<ConversationOrchestrator>,
    router: Arc<Router>,
    poller: Option<Poller>,
    stream: Mutex<Option<mpsc::Receiver<Event>>>,
    running: Mutex<Option<Running>>,
}

impl TelegramBot {
    /// Validates `config` and connects to the Bot API it names. Fails fast on invalid settings.
    pub fn new(config: BotConfig) -> Result<Self> {
        config.validate()?;
        let telegram = TelegramConfig::with_token(config.bot_token())
            .with_api_url(config.telegram_api_url())
            .with_allowed_updates(config.allowed_updates().to_vec());
        let transport = TelegramTransport::new(telegram)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Like [`TelegramBot::new`] with a caller-supplied transport (e.g. a fake in tests).
    pub fn with_transport(config: BotConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let (poller, stream) = match config.update_method() {
            UpdateMethod::GetUpdates => {
                let poller = Poller::new(transport.clone(), config.poller_config())?;
                let stream = poller.take_output_stream()?;
                (Some(poller), Some(stream))
            }
            UpdateMethod::Webhook => (None, None),
        };

        let dispatcher = Arc::new(Dispatcher::new());
        let orchestrator = Arc::new(ConversationOrchestrator::new());
        let router = Arc::new(Router::new(dispatcher.clone(), orchestrator.clone()));

        info!(
            update_method = %config.update_method(),
            workers = config.dispatch.workers,
            "Bot initialized"
        );

        Ok(Self {
            config,
            transport,
            dispatcher,
            orchestrator,
            router,
            poller,
            stream: Mutex::new(stream),
            running: Mutex::new(None),
        })
    }

    /// Replies with `text` to messages no command, default handler or sequence took.
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        let orchestrator = ConversationOrchestrator::with_registry(self.orchestrator.registry().clone())
            .with_default_response(self.transport.clone(), text);
        self.replace_orchestrator(orchestrator)
    }

    /// Starts a sequence from `factory` for messages no command, default handler or sequence took.
    pub fn with_default_sequence(self, factory: Arc<dyn SequenceFactory>) -> Self {
        let orchestrator = ConversationOrchestrator::with_registry(self.orchestrator.registry().clone())
            .with_default_sequence(factory);
        self.replace_orchestrator(orchestrator)
    }

    fn replace_orchestrator(mut self, orchestrator: ConversationOrchestrator) -> Self {
        self.orchestrator = Arc::new(orchestrator);
        self.router = Arc::new(Router::new(self.dispatcher.clone(), self.orchestrator.clone()));
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn orchestrator(&self) -> Arc<ConversationOrchestrator> {
        self.orchestrator.clone()
    }

    /// Poller cursor; `None` in webhook mode.
    pub fn cursor(&self) -> Option<i64> {
        self.poller.as_ref().map(Poller::cursor)
    }

    pub async fn register_handler(&self, command: &str, handler: Arc<dyn Handler>) -> Result<()> {
        Ok(self.dispatcher.register_handler(command, handler).await?)
    }

    pub async fn register_default_handler(&self, handler: Arc<dyn Handler>) -> Result<()> {
        Ok(self.dispatcher.register_default_handler(handler).await?)
    }

    pub async fn register_active_sequence(
        &self,
        chat_id: i64,
        sequence: Arc<dyn Sequence>,
    ) -> Result<()> {
        self.orchestrator
            .register_active_sequence(chat_id, sequence)
            .await
    }

    pub async fn deregister_active_sequence(&self, chat_id: i64) -> Result<()> {
        self.orchestrator.deregister_active_sequence(chat_id).await
    }

    /// Runs one event through the router. Entry point for pushed webhook updates; polled
    /// updates take the same path through the delivery workers.
    pub async fn process_event(&self, event: &Event) -> Result<Routed> {
        self.router.process_event(event).await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<ActionResult> {
        Ok(self.transport.send_message(message).await?)
    }

    /// Registers `webhook` with the platform. Only valid in webhook mode.
    #[instrument(skip(self, webhook))]
    pub async fn register_webhook(&self, webhook: &Webhook) -> Result<bool> {
        if self.config.update_method() != UpdateMethod::Webhook {
            return Err(DbotError::Config(format!(
                "cannot register a webhook when the update method is {}",
                self.config.update_method()
            )));
        }
        let registered = self.transport.register_webhook(webhook).await?;
        info!(registered, "Webhook registration finished");
        Ok(registered)
    }

    #[instrument(skip(self))]
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool> {
        let deleted = self.transport.delete_webhook(drop_pending_updates).await?;
        info!(deleted, "Webhook deletion finished");
        Ok(deleted)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Starts polling and the delivery workers. No-op when already running; an error in
    /// webhook mode, where updates arrive through [`TelegramBot::process_event`].
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let Some(poller) = &self.poller else {
            return Err(DbotError::Config(
                "polling is disabled in webhook mode; feed pushed updates to process_event".to_string(),
            ));
        };

        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("bot already running");
            return Ok(());
        }

        let stream = self
            .stream
            .lock()
            .await
            .take()
            .ok_or_else(|| DbotError::Scheduling("output stream unavailable".to_string()))?;
        let pool = WorkerPool::spawn(
            self.router.clone(),
            self.config.dispatch.workers,
            WORKER_QUEUE_CAPACITY,
            self.config.dispatch.handler_timeout,
        );
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(stream, pool, cancel.clone()));

        if let Err(e) = poller.start() {
            cancel.cancel();
            if let Ok(stream) = pump.await {
                *self.stream.lock().await = Some(stream);
            }
            return Err(e.into());
        }

        *running = Some(Running { cancel, pump });
        info!(cursor = poller.cursor(), "Bot started successfully");
        Ok(())
    }

    /// Stops polling, then lets the workers finish every event already delivered.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let Some(Running { cancel, pump }) = self.running.lock().await.take() else {
            return Ok(());
        };
        if let Some(poller) = &self.poller {
            poller.stop().await;
        }
        cancel.cancel();
        let stream = pump
            .await
            .map_err(|e| DbotError::Scheduling(format!("delivery pump failed: {}", e)))?;
        *self.stream.lock().await = Some(stream);
        info!(cursor = ?self.cursor(), "Bot stopped");
        Ok(())
    }
}

/// Moves events from the poller's output stream to the workers until cancelled, then drains
/// what was already delivered and waits for the workers.
async fn pump(
    mut stream: mpsc::Receiver<Event>,
    pool: WorkerPool,
    cancel: CancellationToken,
) -> mpsc::Receiver<Event> {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = stream.recv() => event,
        };
        let Some(event) = event else {
            break;
        };
        if let Err(e) = pool.submit(event).await {
            warn!(error = %e, "dropping event, delivery workers unavailable");
        }
    }

    // The cursor is already past these; they must still be processed.
    while let Ok(event) = stream.try_recv() {
        if let Err(e) = pool.submit(event).await {
            warn!(error = %e, "dropping event, delivery workers unavailable");
        }
    }
    pool.shutdown().await;
    stream
}

/// Initializes tracing to stdout and the configured log file.
pub fn init_logging(config: &BotConfig) -> AnyResult<()> {
    init_tracing(Some(config.log_file()))
}

/// Main entry: start polling, run until ctrl-c, then stop gracefully.
#[instrument(skip(bot))]
pub async fn run_bot(bot: TelegramBot) -> AnyResult<()> {
    bot.start().await.context("failed to start bot")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    bot.stop().await.context("failed to stop bot")?;
    Ok(())
}
