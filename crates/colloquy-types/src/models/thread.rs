use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Message, MessageId, ThreadId, Timestamp};
use crate::error::{ChatError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: Timestamp,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: Timestamp,
    pub is_active: bool,
}

impl Thread {
    pub fn new(id: ThreadId, title: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn max_message_id(&self) -> Option<MessageId> {
        self.messages.iter().map(|m| m.id).max()
    }

    /// Next locally allocated message id: one past the current maximum, or 1 for an empty thread
    pub fn next_message_id(&self) -> MessageId {
        self.max_message_id().map_or(1, |max| max + 1)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Checks constraints serde cannot express (unique message ids)
    pub fn validate(&self) -> Result<()> {
        validate_messages(&self.messages)
            .map_err(|e| ChatError::Validation(format!("thread {}: {}", self.id, e)))
    }
}

pub fn validate_messages(messages: &[Message]) -> Result<()> {
    let mut seen = HashSet::with_capacity(messages.len());
    for message in messages {
        if !seen.insert(message.id) {
            return Err(ChatError::Validation(format!(
                "duplicate message id {}",
                message.id
            )));
        }
    }
    Ok(())
}
