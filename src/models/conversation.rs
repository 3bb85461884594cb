use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::message::{Draft, Message, MessageId};

pub const GREETING: &str = "Hello! I'm your medication guidance assistant.\n\
Ask me about dosage, interactions, or precautions.\n\n\
Example questions:\n\
• \"Can I take Tylenol and Advil together?\"\n\
• \"Which cold medicines are safe during pregnancy?\"\n\
• \"How many times a day should I take Naxen?\"";

/// Append-only ledger of conversation turns.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<Message>,
    next_id: MessageId,
    #[serde(skip)]
    scroll_anchor: Option<MessageId>,
}

impl Conversation {
    /// Start a session seeded with the greeting.
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut conversation = Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            messages: Vec::new(),
            next_id: 1,
            scroll_anchor: None,
        };
        conversation.append(Draft::bot(GREETING, now));
        conversation
    }

    pub fn append(&mut self, draft: Draft) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(draft.into_message(id));
        self.scroll_anchor = Some(id);
        id
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // Ids are assigned in insertion order, so the list is sorted by id.
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The newest message the view has not scrolled to yet.
    pub fn take_scroll_anchor(&mut self) -> Option<MessageId> {
        self.scroll_anchor.take()
    }
}
