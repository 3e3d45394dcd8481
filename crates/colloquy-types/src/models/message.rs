use serde::{Deserialize, Serialize};

use super::{MessageId, Timestamp};
use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(id: MessageId, text: impl Into<String>, sender: Sender, timestamp: Timestamp) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            timestamp,
        }
    }

    pub fn user(id: MessageId, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(id, text, Sender::User, timestamp)
    }

    pub fn assistant(id: MessageId, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(id, text, Sender::Assistant, timestamp)
    }

    /// Empty assistant message that a streamed reply is written into
    pub fn placeholder(id: MessageId, timestamp: Timestamp) -> Self {
        Self::new(id, String::new(), Sender::Assistant, timestamp)
    }
}

/// Text the user is about to submit. Blank input never becomes an `OutgoingText`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingText(String);

impl OutgoingText {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ChatError::Validation("outgoing text is empty".to_string()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for OutgoingText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OutgoingText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
