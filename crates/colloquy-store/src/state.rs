use colloquy_types::{MessageId, Thread, ThreadId};
use serde::{Deserialize, Serialize};

/// The message currently receiving streamed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTarget {
    pub thread_id: ThreadId,
    pub message_id: MessageId,
}

/// Canonical conversation state
///
/// Plain data: every field serializes, so an external persistence layer can
/// snapshot and restore it wholesale. All writes go through [`crate::Mutation`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    pub(crate) threads: Vec<Thread>,
    pub(crate) current_thread_id: Option<ThreadId>,
    pub(crate) loading: bool,
    pub(crate) typing: bool,
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) streaming_target: Option<StreamTarget>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn active_threads(&self) -> Vec<&Thread> {
        self.threads.iter().filter(|t| t.is_active).collect()
    }

    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current_thread_id
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current_thread_id.and_then(|id| self.thread(id))
    }

    pub fn total_message_count(&self) -> usize {
        self.threads.iter().map(|t| t.messages.len()).sum()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn active_thread_count(&self) -> usize {
        self.threads.iter().filter(|t| t.is_active).count()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn streaming_target(&self) -> Option<StreamTarget> {
        self.streaming_target
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.thread_index(id).map(|idx| &self.threads[idx])
    }

    /// Next id for a thread created locally: one past the current maximum, or 1
    pub fn next_thread_id(&self) -> ThreadId {
        self.threads.iter().map(|t| t.id).max().map_or(1, |max| max + 1)
    }

    pub fn next_message_id(&self, thread_id: ThreadId) -> Option<MessageId> {
        self.thread(thread_id).map(Thread::next_message_id)
    }

    // Every id lookup funnels through this one scan.
    pub(crate) fn thread_index(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id == id)
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.thread_index(id).map(move |idx| &mut self.threads[idx])
    }
}
