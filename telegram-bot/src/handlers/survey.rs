//! A question-by-question survey run as a [`Sequence`].
//!
//! `/survey` registers a [`SurveySequence`] for the chat. Every following message of that chat,
//! commands included, is an answer until the last question is answered or the user sends
//! `/cancel`; the sequence then deregisters itself.

use std::sync::Arc;

use async_trait::async_trait;
use conversation::Orchestrator;
use dbot_core::{Event, Handler, HandlerError, Result, Sequence, Transport};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::reply;

pub const CANCEL_COMMAND: &str = "/cancel";

/// Multi-turn survey bound to one chat.
pub struct SurveySequence {
    chat_id: i64,
    transport: Arc<dyn Transport>,
    orchestrator: Arc<dyn Orchestrator>,
    questions: Vec<String>,
    answers: Mutex<Vec<String>>,
}

impl SurveySequence {
    pub fn new(
        chat_id: i64,
        transport: Arc<dyn Transport>,
        orchestrator: Arc<dyn Orchestrator>,
        questions: Vec<String>,
    ) -> Self {
        Self {
            chat_id,
            transport,
            orchestrator,
            questions,
            answers: Mutex::new(Vec::new()),
        }
    }

    pub async fn answers(&self) -> Vec<String> {
        self.answers.lock().await.clone()
    }

    async fn ask(&self, index: usize) -> Result<()> {
        let question = &self.questions[index];
        reply(
            self.transport.as_ref(),
            self.chat_id,
            format!("({}/{}) {}", index + 1, self.questions.len(), question),
        )
        .await
    }
}

#[async_trait]
impl Sequence for SurveySequence {
    async fn start(&self, _event: &Event) -> Result<()> {
        if self.questions.is_empty() {
            return Err(HandlerError::State("survey has no questions".to_string()).into());
        }
        self.answers.lock().await.clear();
        self.ask(0).await
    }

    async fn process(&self, event: &Event) -> Result<()> {
        let text = event
            .as_message()
            .and_then(|m| m.text.as_deref())
            .map(str::trim)
            .ok_or(HandlerError::NoText)?;

        if text == CANCEL_COMMAND {
            info!(chat_id = self.chat_id, "step: survey cancelled");
            self.orchestrator
                .deregister_active_sequence(self.chat_id)
                .await?;
            return reply(self.transport.as_ref(), self.chat_id, "Survey cancelled.").await;
        }

        let answered = {
            let mut answers = self.answers.lock().await;
            answers.push(text.to_string());
            answers.len()
        };
        debug!(chat_id = self.chat_id, answered, "step: survey answer recorded");

        if answered < self.questions.len() {
            return self.ask(answered).await;
        }

        self.orchestrator
            .deregister_active_sequence(self.chat_id)
            .await?;
        self.finish().await
    }

    async fn finish(&self) -> Result<()> {
        let answers = self.answers.lock().await.clone();
        let summary = self
            .questions
            .iter()
            .zip(answers.iter())
            .map(|(q, a)| format!("{} {}", q, a))
            .collect::<Vec<_>>()
            .join("\n");
        info!(chat_id = self.chat_id, answers = answers.len(), "step: survey finished");
        reply(
            self.transport.as_ref(),
            self.chat_id,
            format!("Thanks! Your answers:\n{}", summary),
        )
        .await
    }

    fn name(&self) -> &str {
        "survey"
    }
}

/// Starts a [`SurveySequence`] for the chat the command came from.
pub struct SurveyHandler {
    transport: Arc<dyn Transport>,
    orchestrator: Arc<dyn Orchestrator>,
    questions: Vec<String>,
}

impl SurveyHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        orchestrator: Arc<dyn Orchestrator>,
        questions: Vec<String>,
    ) -> Self {
        Self {
            transport,
            orchestrator,
            questions,
        }
    }
}

#[async_trait]
impl Handler for SurveyHandler {
    async fn handle(&self, event: &Event) -> Result<()> {
        let Some(chat_id) = event.chat_id() else {
            return Ok(());
        };
        let sequence: Arc<dyn Sequence> = Arc::new(SurveySequence::new(
            chat_id,
            self.transport.clone(),
            self.orchestrator.clone(),
            self.questions.clone(),
        ));
        self.orchestrator
            .register_active_sequence(chat_id, sequence.clone())
            .await?;
        if let Err(e) = sequence.start(event).await {
            self.orchestrator.deregister_active_sequence(chat_id).await?;
            return Err(e);
        }
        Ok(())
    }
}
