use colloquy_types::{
    validate_messages, ChatError, Message, MessageId, Result, Thread, ThreadId, Timestamp,
};

use crate::state::{ChatState, StreamTarget};

/// Closed set of state transitions
///
/// Each mutation is synchronous and total: it either applies completely or
/// leaves the state untouched and reports why. `AddThread` and `AddMessage`
/// append on every call, so callers must issue them at most once per event.
///
/// Appended ids must exceed every id already present: thread ids across the
/// store, message ids within their thread. Non-positive message ids are the
/// local placeholder namespace and only need to be unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetLoading(bool),
    SetTyping(bool),
    SetError(Option<String>),
    /// Full replacement after a bulk load
    SetThreads(Vec<Thread>),
    SetCurrentThreadId(Option<ThreadId>),
    /// Append a thread carrying a pre-assigned id and select it
    AddThread(Thread),
    AddMessage {
        thread_id: ThreadId,
        message: Message,
    },
    /// Full replacement of the active streaming target's text
    ReplaceMessageText {
        thread_id: ThreadId,
        message_id: MessageId,
        text: String,
    },
    SetThreadMessages {
        thread_id: ThreadId,
        messages: Vec<Message>,
    },
    ToggleThreadActive(ThreadId),
    /// Append an empty reply and make it the single streaming target
    BeginStream {
        thread_id: ThreadId,
        placeholder: Message,
    },
    /// Seal `target`; a different active target is left alone
    EndStream(StreamTarget),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetTyping(_) => "set_typing",
            Self::SetError(_) => "set_error",
            Self::SetThreads(_) => "set_threads",
            Self::SetCurrentThreadId(_) => "set_current_thread_id",
            Self::AddThread(_) => "add_thread",
            Self::AddMessage { .. } => "add_message",
            Self::ReplaceMessageText { .. } => "replace_message_text",
            Self::SetThreadMessages { .. } => "set_thread_messages",
            Self::ToggleThreadActive(_) => "toggle_thread_active",
            Self::BeginStream { .. } => "begin_stream",
            Self::EndStream(_) => "end_stream",
        }
    }
}

impl ChatState {
    /// Apply one mutation. `now` stamps `updatedAt` on message mutations.
    pub fn apply(&mut self, mutation: Mutation, now: Timestamp) -> Result<()> {
        match mutation {
            Mutation::SetLoading(loading) => self.loading = loading,
            Mutation::SetTyping(typing) => self.typing = typing,
            Mutation::SetError(error) => self.error = error,
            Mutation::SetThreads(threads) => {
                self.threads = threads;
                if let Some(current) = self.current_thread_id {
                    if self.thread_index(current).is_none() {
                        self.current_thread_id = None;
                    }
                }
                if let Some(target) = self.streaming_target {
                    if self.thread_index(target.thread_id).is_none() {
                        self.streaming_target = None;
                    }
                }
            }
            Mutation::SetCurrentThreadId(None) => self.current_thread_id = None,
            Mutation::SetCurrentThreadId(Some(id)) => {
                if self.thread_index(id).is_none() {
                    return Err(ChatError::ThreadNotFound(id));
                }
                self.current_thread_id = Some(id);
            }
            Mutation::AddThread(thread) => {
                if let Some(max) = self.threads.iter().map(|t| t.id).max() {
                    if thread.id <= max {
                        return Err(ChatError::Validation(format!(
                            "thread id {} is not above current maximum {}",
                            thread.id, max
                        )));
                    }
                }
                thread.validate()?;
                self.current_thread_id = Some(thread.id);
                self.threads.push(thread);
            }
            Mutation::AddMessage { thread_id, message } => {
                let thread = self
                    .thread_mut(thread_id)
                    .ok_or(ChatError::ThreadNotFound(thread_id))?;
                check_appended_id(thread, message.id)?;
                thread.messages.push(message);
                thread.updated_at = now;
            }
            Mutation::ReplaceMessageText {
                thread_id,
                message_id,
                text,
            } => {
                let is_target = self.streaming_target
                    == Some(StreamTarget {
                        thread_id,
                        message_id,
                    });
                let thread = self
                    .thread_mut(thread_id)
                    .ok_or(ChatError::ThreadNotFound(thread_id))?;
                let message = thread
                    .message_mut(message_id)
                    .ok_or(ChatError::MessageNotFound {
                        thread_id,
                        message_id,
                    })?;
                if !is_target {
                    return Err(ChatError::MessageSealed {
                        thread_id,
                        message_id,
                    });
                }
                message.text = text;
                thread.updated_at = now;
            }
            Mutation::SetThreadMessages {
                thread_id,
                messages,
            } => {
                validate_messages(&messages)?;
                let thread = self
                    .thread_mut(thread_id)
                    .ok_or(ChatError::ThreadNotFound(thread_id))?;
                thread.messages = messages;
                thread.updated_at = now;
            }
            Mutation::ToggleThreadActive(thread_id) => {
                let thread = self
                    .thread_mut(thread_id)
                    .ok_or(ChatError::ThreadNotFound(thread_id))?;
                thread.is_active = !thread.is_active;
            }
            Mutation::BeginStream {
                thread_id,
                placeholder,
            } => {
                if let Some(active) = self.streaming_target {
                    return Err(ChatError::StreamInFlight {
                        thread_id: active.thread_id,
                        message_id: active.message_id,
                    });
                }
                let message_id = placeholder.id;
                let thread = self
                    .thread_mut(thread_id)
                    .ok_or(ChatError::ThreadNotFound(thread_id))?;
                check_appended_id(thread, message_id)?;
                thread.messages.push(placeholder);
                thread.updated_at = now;
                self.streaming_target = Some(StreamTarget {
                    thread_id,
                    message_id,
                });
            }
            Mutation::EndStream(target) => {
                if self.streaming_target == Some(target) {
                    self.streaming_target = None;
                }
            }
        }
        Ok(())
    }
}

fn check_appended_id(thread: &Thread, id: MessageId) -> Result<()> {
    if thread.message(id).is_some() {
        return Err(ChatError::Validation(format!(
            "message id {} already present in thread {}",
            id, thread.id
        )));
    }
    if id > 0 {
        if let Some(max) = thread.messages.iter().map(|m| m.id).filter(|m| *m > 0).max() {
            if id <= max {
                return Err(ChatError::Validation(format!(
                    "message id {} is not above thread {} maximum {}",
                    id, thread.id, max
                )));
            }
        }
    }
    Ok(())
}
