//! `dbot` binary: a demo bot (greeting, survey, default reply) plus webhook management.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use conversation::Orchestrator;
use telegram_bot::{
    init_logging, load_config, run_bot, Cli, Commands, GreetingHandler, SurveyHandler,
    TelegramBot, Webhook,
};
use tracing::info;

const DEFAULT_REPLY: &str = "Send /start for a greeting or /survey to answer a few questions.";

fn survey_questions() -> Vec<String> {
    vec![
        "What is your name?".to_string(),
        "Which language do you write most?".to_string(),
        "What should this bot do next?".to_string(),
    ]
}

async fn build_demo_bot(token: Option<String>) -> Result<TelegramBot> {
    let config = load_config(token)?;
    init_logging(&config)?;

    let bot = TelegramBot::new(config)?.with_default_response(DEFAULT_REPLY);
    let orchestrator: Arc<dyn Orchestrator> = bot.orchestrator();

    bot.register_handler(
        "/start",
        Arc::new(GreetingHandler::new(bot.transport(), "Nice to meet you.")),
    )
    .await?;
    bot.register_handler(
        "/survey",
        Arc::new(SurveyHandler::new(
            bot.transport(),
            orchestrator,
            survey_questions(),
        )),
    )
    .await?;

    Ok(bot)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let bot = build_demo_bot(token).await?;
            run_bot(bot).await
        }
        Commands::SetWebhook {
            token,
            url,
            drop_pending,
        } => {
            let config = load_config(token)?;
            init_logging(&config)?;
            let url = url
                .or_else(|| config.webhook_url().map(str::to_string))
                .context("no webhook url: pass --url or set WEBHOOK_URL")?;
            let bot = TelegramBot::new(config)?;
            let registered = bot
                .register_webhook(&Webhook {
                    url,
                    drop_pending_updates: drop_pending,
                    ..Webhook::default()
                })
                .await?;
            info!(registered, "set-webhook done");
            Ok(())
        }
        Commands::DeleteWebhook {
            token,
            drop_pending,
        } => {
            let config = load_config(token)?;
            init_logging(&config)?;
            let bot = TelegramBot::new(config)?;
            let deleted = bot.delete_webhook(drop_pending).await?;
            info!(deleted, "delete-webhook done");
            Ok(())
        }
    }
}
