use colloquy_types::{MessageId, ThreadId};
use std::fmt;

/// Why a send was ignored before any remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    EmptyText,
    NoCurrentThread,
    /// Another assistant reply has not finished yet
    ReplyInFlight,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyText => write!(f, "message is empty"),
            Self::NoCurrentThread => write!(f, "no conversation selected"),
            Self::ReplyInFlight => write!(f, "a reply is still in progress"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// User message stored and the assistant reply completed
    Replied {
        thread_id: ThreadId,
        user_message_id: MessageId,
        reply_message_id: MessageId,
    },
    /// Streaming stopped at the caller's request; partial text stays in place
    Abandoned {
        thread_id: ThreadId,
        user_message_id: MessageId,
        reply_message_id: MessageId,
    },
    Dropped(DropReason),
}

impl SendOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }

    pub fn reply_message_id(&self) -> Option<MessageId> {
        match self {
            Self::Replied {
                reply_message_id, ..
            }
            | Self::Abandoned {
                reply_message_id, ..
            } => Some(*reply_message_id),
            Self::Dropped(_) => None,
        }
    }
}
