#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use colloquy_controller::{ControllerConfig, ConversationController};
use colloquy_remote::{ByteStream, ChatService};
use colloquy_store::{ManualClock, Store};
use colloquy_types::{ChatError, Message, MessageId, OutgoingText, Result, Thread, ThreadId, Timestamp};
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListThreads,
    GetThread(ThreadId),
    ListMessages(ThreadId),
    SendUser(ThreadId, String),
    SendAssistant(ThreadId, String),
    Stream(ThreadId, String),
    CreateThread(String, String),
}

pub enum StreamScript {
    Chunks(Vec<Result<Vec<u8>>>),
    /// Yields `before`, waits on the gate, then yields `after`
    Gated {
        before: Vec<Result<Vec<u8>>>,
        gate: Arc<Notify>,
        after: Vec<Result<Vec<u8>>>,
    },
    /// Records the target message's text before each chunk is handed over
    Observed {
        chunks: Vec<Result<Vec<u8>>>,
        store: Store,
        thread_id: ThreadId,
        message_id: MessageId,
        seen: Arc<Mutex<Vec<String>>>,
    },
    FailOpen(ChatError),
    HangOpen,
}

/// In-memory `ChatService` answering from per-operation queues
///
/// An operation with nothing queued fails with a transport error.
#[derive(Default)]
pub struct ScriptedService {
    calls: Mutex<Vec<Call>>,
    list_threads: Mutex<VecDeque<Result<Vec<Thread>>>>,
    list_messages: Mutex<VecDeque<Result<Vec<Message>>>>,
    send_user: Mutex<VecDeque<Result<Message>>>,
    send_assistant: Mutex<VecDeque<Result<Message>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    create_thread: Mutex<VecDeque<Result<Thread>>>,
    send_user_gate: Mutex<Option<Arc<Notify>>>,
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T>>>, op: &str) -> Result<T> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ChatError::transport(None, format!("{} not scripted", op))))
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn on_list_threads(&self, result: Result<Vec<Thread>>) {
        self.list_threads.lock().unwrap().push_back(result);
    }

    pub fn on_list_messages(&self, result: Result<Vec<Message>>) {
        self.list_messages.lock().unwrap().push_back(result);
    }

    pub fn on_send_user(&self, result: Result<Message>) {
        self.send_user.lock().unwrap().push_back(result);
    }

    /// The next `send_user_message` waits on `gate` before answering
    pub fn hold_send_user(&self, gate: Arc<Notify>) {
        *self.send_user_gate.lock().unwrap() = Some(gate);
    }

    pub fn on_send_assistant(&self, result: Result<Message>) {
        self.send_assistant.lock().unwrap().push_back(result);
    }

    pub fn on_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    pub fn on_create_thread(&self, result: Result<Thread>) {
        self.create_thread.lock().unwrap().push_back(result);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatService for ScriptedService {
    async fn list_threads(&self) -> Result<Vec<Thread>> {
        self.record(Call::ListThreads);
        pop(&self.list_threads, "list_threads")
    }

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread> {
        self.record(Call::GetThread(thread_id));
        Err(ChatError::transport(Some(404), "not scripted"))
    }

    async fn list_messages(&self, thread_id: ThreadId) -> Result<Vec<Message>> {
        self.record(Call::ListMessages(thread_id));
        pop(&self.list_messages, "list_messages")
    }

    async fn send_user_message(&self, thread_id: ThreadId, text: &OutgoingText) -> Result<Message> {
        self.record(Call::SendUser(thread_id, text.as_str().to_string()));
        let gate = self.send_user_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        pop(&self.send_user, "send_user_message")
    }

    async fn send_assistant_message(&self, thread_id: ThreadId, text: &str) -> Result<Message> {
        self.record(Call::SendAssistant(thread_id, text.to_string()));
        pop(&self.send_assistant, "send_assistant_message")
    }

    async fn send_assistant_message_streaming(
        &self,
        thread_id: ThreadId,
        text: &str,
    ) -> Result<ByteStream> {
        self.record(Call::Stream(thread_id, text.to_string()));
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(StreamScript::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(StreamScript::Gated { before, gate, after }) => {
                let opened = async move {
                    gate.notified().await;
                    stream::iter(after)
                };
                Ok(Box::pin(
                    stream::iter(before).chain(stream::once(opened).flatten()),
                ))
            }
            Some(StreamScript::Observed {
                chunks,
                store,
                thread_id,
                message_id,
                seen,
            }) => Ok(Box::pin(async_stream::stream! {
                for chunk in chunks {
                    let text = store.read(|s| {
                        s.thread(thread_id)
                            .and_then(|t| t.message(message_id))
                            .map(|m| m.text.clone())
                    });
                    if let Some(text) = text {
                        seen.lock().unwrap().push(text);
                    }
                    yield chunk;
                }
            })),
            Some(StreamScript::FailOpen(e)) => Err(e),
            Some(StreamScript::HangOpen) => std::future::pending().await,
            None => Err(ChatError::transport(None, "stream not scripted")),
        }
    }

    async fn create_thread(&self, title: &str, first_message: &OutgoingText) -> Result<Thread> {
        self.record(Call::CreateThread(
            title.to_string(),
            first_message.as_str().to_string(),
        ));
        pop(&self.create_thread, "create_thread")
    }
}

pub fn at(ms: i64) -> Timestamp {
    Utc.timestamp_millis_opt(ms).unwrap()
}

pub fn text_chunks(parts: &[&str]) -> Vec<Result<Vec<u8>>> {
    parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
}

pub fn thread(id: ThreadId, title: &str, messages: Vec<Message>) -> Thread {
    Thread::new(id, title, at(0)).with_messages(messages)
}

pub struct Harness {
    pub service: Arc<ScriptedService>,
    pub clock: Arc<ManualClock>,
    pub store: Store,
    pub controller: ConversationController,
}

pub fn harness(config: ControllerConfig) -> Harness {
    let service = ScriptedService::new();
    let clock = Arc::new(ManualClock::new(at(1_000)));
    let store = Store::with_clock(clock.clone());
    let controller = ConversationController::new(store.clone(), service.clone(), config);
    Harness {
        service,
        clock,
        store,
        controller,
    }
}

/// Harness whose store already holds `threads` with the first one selected
pub fn harness_with_threads(config: ControllerConfig, threads: Vec<Thread>) -> Harness {
    let h = harness(config);
    let first = threads.first().map(|t| t.id);
    h.store
        .commit(colloquy_store::Mutation::SetThreads(threads))
        .unwrap();
    h.store
        .commit(colloquy_store::Mutation::SetCurrentThreadId(first))
        .unwrap();
    h
}
