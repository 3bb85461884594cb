use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::citation::Citation;

pub type MessageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// A single conversation turn. Built through the constructors below and
/// never mutated after it enters the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<Citation>,
    pub processing_time: Option<Duration>,
    pub model_used: Option<String>,
}

/// A message that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct Draft {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<Citation>,
    pub processing_time: Option<Duration>,
    pub model_used: Option<String>,
}

impl Draft {
    pub fn user(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp,
            sources: Vec::new(),
            processing_time: None,
            model_used: None,
        }
    }

    pub fn bot(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            timestamp,
            sources: Vec::new(),
            processing_time: None,
            model_used: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<Citation>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_processing_time(mut self, processing_time: Option<Duration>) -> Self {
        self.processing_time = processing_time;
        self
    }

    pub fn with_model(mut self, model_used: Option<String>) -> Self {
        self.model_used = model_used;
        self
    }

    pub(crate) fn into_message(self, id: MessageId) -> Message {
        // Citations only ever belong to bot answers.
        let sources = match self.sender {
            Sender::Bot => self.sources,
            Sender::User => Vec::new(),
        };
        Message {
            id,
            text: self.text,
            sender: self.sender,
            timestamp: self.timestamp,
            sources,
            processing_time: self.processing_time,
            model_used: self.model_used,
        }
    }
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}
