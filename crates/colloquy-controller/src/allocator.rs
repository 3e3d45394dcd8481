use colloquy_store::ChatState;
use colloquy_types::{MessageId, ThreadId};
use serde::{Deserialize, Serialize};

/// Chooses the provisional id of a streamed assistant reply
///
/// The id only addresses in-place text replacement while the reply streams.
/// It is never assumed to match an id the server may assign later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamTargetAllocator {
    /// `user_message_id + 1`, or one past the thread maximum when that is higher
    SiblingIncrement,
    /// Negative ids counting down from -1, disjoint from server ids
    LocalNamespace,
}

impl Default for StreamTargetAllocator {
    fn default() -> Self {
        StreamTargetAllocator::SiblingIncrement
    }
}

impl StreamTargetAllocator {
    pub fn allocate(
        &self,
        state: &ChatState,
        thread_id: ThreadId,
        user_message_id: MessageId,
    ) -> MessageId {
        let thread = state.thread(thread_id);
        match self {
            Self::SiblingIncrement => {
                let candidate = user_message_id + 1;
                thread.map_or(candidate, |t| candidate.max(t.next_message_id()))
            }
            Self::LocalNamespace => thread
                .and_then(|t| t.messages.iter().map(|m| m.id).filter(|id| *id < 0).min())
                .map_or(-1, |lowest| lowest - 1),
        }
    }
}
