use thiserror::Error;

use crate::models::{MessageId, ThreadId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Outgoing text or an incoming payload did not have the expected shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request failed before any data was received
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Streaming read failed after the stream was opened
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("Message {message_id} not found in thread {thread_id}")]
    MessageNotFound {
        thread_id: ThreadId,
        message_id: MessageId,
    },

    /// Text replacement targeted a message that is not the active streaming target
    #[error("Message {message_id} in thread {thread_id} is sealed")]
    MessageSealed {
        thread_id: ThreadId,
        message_id: MessageId,
    },

    /// Another reply is already streaming into this store
    #[error("Message {message_id} in thread {thread_id} is already streaming")]
    StreamInFlight {
        thread_id: ThreadId,
        message_id: MessageId,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl ChatError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Stale-state errors that mutations swallow instead of surfacing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ThreadNotFound(_) | Self::MessageNotFound { .. } | Self::MessageSealed { .. }
        )
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
