use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::models::{Conversation, Draft, MessageId, Sender};
use crate::providers::{ChatReply, ChatService, ProviderError};
use crate::services::classifier;

pub type ExchangeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Retrieving,
    Composing,
}

impl ProgressStage {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStage::Retrieving => "Retrieving relevant documents...",
            ProgressStage::Composing => "Composing answer...",
        }
    }
}

/// The one question currently awaiting an answer.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub id: ExchangeId,
    pub stage: ProgressStage,
    pub input: String,
    pub started_at: Instant,
}

/// Everything needed to dispatch an accepted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub exchange: ExchangeId,
    pub user_message: MessageId,
    pub text: String,
}

#[derive(Debug)]
pub enum ExchangeEvent {
    StageAdvanced(ExchangeId),
    Resolved {
        exchange: ExchangeId,
        outcome: Result<ChatReply, ProviderError>,
    },
}

/// Owned conversation state. All mutation goes through the methods below.
#[derive(Debug)]
pub struct ChatSession {
    conversation: Conversation,
    pending: Option<PendingExchange>,
    input: String,
    expanded_sources: HashSet<MessageId>,
    next_exchange: ExchangeId,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(Conversation::new(Utc::now()))
    }
}

impl ChatSession {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            pending: None,
            input: String::new(),
            expanded_sources: HashSet::new(),
            next_exchange: 1,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn pending(&self) -> Option<&PendingExchange> {
        self.pending.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn take_scroll_anchor(&mut self) -> Option<MessageId> {
        self.conversation.take_scroll_anchor()
    }

    /// Accept a question: append it, clear the input, open the exchange.
    ///
    /// Blank text or an exchange already in flight makes this a no-op.
    pub fn begin_submit(&mut self, text: &str, now: DateTime<Utc>) -> Option<Submission> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank submission");
            return None;
        }
        if let Some(pending) = &self.pending {
            tracing::debug!(exchange = pending.id, "Ignoring submission while an exchange is pending");
            return None;
        }

        let user_message = self.conversation.append(Draft::user(text, now));
        self.input.clear();

        let exchange = self.next_exchange;
        self.next_exchange += 1;
        self.pending = Some(PendingExchange {
            id: exchange,
            stage: ProgressStage::Retrieving,
            input: text.to_string(),
            started_at: Instant::now(),
        });

        tracing::info!(
            conversation_id = %self.conversation.id,
            exchange,
            chars = text.chars().count(),
            "Dispatching question"
        );

        Some(Submission {
            exchange,
            user_message,
            text: text.to_string(),
        })
    }

    pub fn advance_stage(&mut self, exchange: ExchangeId) -> bool {
        match &mut self.pending {
            Some(pending) if pending.id == exchange => {
                pending.stage = ProgressStage::Composing;
                tracing::debug!(exchange, stage = pending.stage.label(), "Stage advanced");
                true
            }
            _ => false,
        }
    }

    /// Close the exchange with exactly one bot message.
    pub fn resolve(
        &mut self,
        exchange: ExchangeId,
        outcome: Result<ChatReply, ProviderError>,
        now: DateTime<Utc>,
    ) -> Option<MessageId> {
        let pending = match self.pending.take() {
            Some(p) if p.id == exchange => p,
            other => {
                tracing::debug!(exchange, "Ignoring resolution for a stale exchange");
                self.pending = other;
                return None;
            }
        };

        let elapsed = pending.started_at.elapsed();
        let draft = match outcome {
            Ok(reply) => {
                tracing::info!(
                    exchange,
                    elapsed_ms = elapsed.as_millis() as u64,
                    model = reply.model_used.as_deref().unwrap_or("unknown"),
                    sources = reply.sources.len(),
                    "Answer received"
                );
                Draft::bot(reply.text, now)
                    .with_sources(reply.sources)
                    .with_processing_time(reply.processing_time)
                    .with_model(reply.model_used)
            }
            Err(err) => Draft::bot(classifier::failure_message(&err), now),
        };

        Some(self.conversation.append(draft))
    }

    /// Apply an event from `run_exchange`. Returns the id of an appended
    /// bot message, if the event produced one.
    pub fn apply(&mut self, event: ExchangeEvent, now: DateTime<Utc>) -> Option<MessageId> {
        match event {
            ExchangeEvent::StageAdvanced(exchange) => {
                self.advance_stage(exchange);
                None
            }
            ExchangeEvent::Resolved { exchange, outcome } => self.resolve(exchange, outcome, now),
        }
    }

    /// Run one whole exchange in place.
    pub async fn submit(
        &mut self,
        service: &dyn ChatService,
        text: &str,
        stage_delay: Duration,
    ) -> bool {
        let Some(submission) = self.begin_submit(text, Utc::now()) else {
            return false;
        };

        let (tx, mut rx) = mpsc::channel(4);
        run_exchange(service, submission, stage_delay, &tx).await;
        drop(tx);

        while let Some(event) = rx.recv().await {
            self.apply(event, Utc::now());
        }
        true
    }

    pub fn toggle_sources(&mut self, id: MessageId) -> bool {
        if self.expanded_sources.remove(&id) {
            false
        } else {
            self.expanded_sources.insert(id);
            true
        }
    }

    pub fn sources_visible(&self, id: MessageId) -> bool {
        self.expanded_sources.contains(&id)
    }

    /// Pre-fill the input with a previous question. Never sends.
    pub fn reuse_text(&mut self, id: MessageId) -> bool {
        match self.conversation.get(id) {
            Some(message) if message.sender == Sender::User => {
                self.input = message.text.clone();
                true
            }
            _ => false,
        }
    }
}

/// The asynchronous half of a submission: hold the first stage for
/// `stage_delay`, then ask the service. Always ends with `Resolved`.
pub async fn run_exchange(
    service: &dyn ChatService,
    submission: Submission,
    stage_delay: Duration,
    tx: &mpsc::Sender<ExchangeEvent>,
) {
    let exchange = submission.exchange;
    tracing::debug!(exchange, message = submission.user_message, "Exchange started");

    tokio::time::sleep(stage_delay).await;
    let _ = tx.send(ExchangeEvent::StageAdvanced(exchange)).await;

    let outcome = service.send_message(&submission.text).await;
    if tx
        .send(ExchangeEvent::Resolved { exchange, outcome })
        .await
        .is_err()
    {
        tracing::error!(exchange, "Session dropped before the exchange resolved");
    }
}
