use colloquy_remote::{ChatService, IngestOutcome, StreamIngestor};
use colloquy_store::{Mutation, SnapshotStore, Store, StreamTarget};
use colloquy_types::{ChatError, Message, MessageId, OutgoingText, Result, ThreadId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::builder::ControllerBuilder;
use crate::config::{ControllerConfig, ToggleMode, DEFAULT_THREAD_TITLE};
use crate::guard::{LoadingTracker, ReplyPermit, ReplySlot, StreamTargetGuard, TypingGuard};
use crate::outcome::{DropReason, SendOutcome};

/// A send that passed admission: text is non-blank, the thread was captured
/// and the reply slot is held until this is dropped.
struct AdmittedSend {
    thread_id: ThreadId,
    text: OutgoingText,
    _permit: ReplyPermit,
}

/// Orchestrates multi-step conversation flows over a shared [`Store`]
///
/// Remote failures are caught per flow, written to the store's error slot as
/// one readable message, and also returned to the caller. `loading` and
/// `typing` are reset by guards, so they are false again whenever a flow
/// returns or its future is dropped.
#[derive(Clone)]
pub struct ConversationController {
    store: Store,
    service: Arc<dyn ChatService>,
    ingestor: StreamIngestor,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: ControllerConfig,
    reply_slot: ReplySlot,
    loading: LoadingTracker,
}

impl ConversationController {
    pub fn new(store: Store, service: Arc<dyn ChatService>, config: ControllerConfig) -> Self {
        Self::with_parts(store, service, None, config)
    }

    pub(crate) fn with_parts(
        store: Store,
        service: Arc<dyn ChatService>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
        config: ControllerConfig,
    ) -> Self {
        let ingestor = StreamIngestor::new(Arc::clone(&service), config.ingest.clone());
        Self {
            store,
            service,
            ingestor,
            snapshots,
            config,
            reply_slot: ReplySlot::new(),
            loading: LoadingTracker::default(),
        }
    }

    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn has_snapshots(&self) -> bool {
        self.snapshots.is_some()
    }

    pub fn is_reply_in_flight(&self) -> bool {
        self.reply_slot.is_held()
    }

    pub async fn load_threads(&self) -> Result<()> {
        let _loading = self.loading.begin(&self.store);
        self.store.apply(Mutation::SetError(None));

        match self.service.list_threads().await {
            Ok(threads) => {
                let first = threads.first().map(|t| t.id);
                let count = threads.len();
                self.store.apply(Mutation::SetThreads(threads));
                if self.store.read(|s| s.current_thread_id().is_none()) {
                    if let Some(id) = first {
                        self.store.apply(Mutation::SetCurrentThreadId(Some(id)));
                    }
                }
                tracing::info!(threads = count, "threads loaded");
                Ok(())
            }
            Err(e) => {
                self.fail("Failed to load threads", &e);
                self.store.apply(Mutation::SetThreads(Vec::new()));
                Err(e)
            }
        }
    }

    pub async fn load_messages(&self, thread_id: ThreadId) -> Result<()> {
        let _loading = self.loading.begin(&self.store);
        self.store.apply(Mutation::SetError(None));

        match self.service.list_messages(thread_id).await {
            Ok(messages) => {
                let streaming_here = self
                    .store
                    .read(|s| s.streaming_target().map(|t| t.thread_id) == Some(thread_id));
                if streaming_here {
                    tracing::debug!(thread_id, "reply streaming into thread, keeping local messages");
                    return Ok(());
                }
                tracing::debug!(thread_id, messages = messages.len(), "messages loaded");
                self.store.apply(Mutation::SetThreadMessages {
                    thread_id,
                    messages,
                });
                Ok(())
            }
            Err(e) => {
                self.fail("Failed to load messages", &e);
                Err(e)
            }
        }
    }

    /// Create a thread remotely and select it
    ///
    /// Returns `None` without touching state when the first message is blank.
    pub async fn create_thread(&self, title: &str, first_message: &str) -> Result<Option<ThreadId>> {
        let first_message = match OutgoingText::new(first_message) {
            Ok(text) => text,
            Err(_) => {
                tracing::debug!("create_thread dropped: empty first message");
                return Ok(None);
            }
        };
        let title = match title.trim() {
            "" => DEFAULT_THREAD_TITLE,
            trimmed => trimmed,
        };

        let _loading = self.loading.begin(&self.store);
        self.store.apply(Mutation::SetError(None));

        let thread = match self.service.create_thread(title, &first_message).await {
            Ok(thread) => thread,
            Err(e) => {
                self.fail("Failed to create thread", &e);
                return Err(e);
            }
        };

        let thread_id = thread.id;
        if let Err(e) = self.store.commit(Mutation::AddThread(thread)) {
            self.fail("Failed to create thread", &e);
            return Err(e);
        }
        tracing::info!(thread_id, title, "thread created");

        // The error slot already carries any failure here
        let _ = self.load_messages(thread_id).await;
        Ok(Some(thread_id))
    }

    /// Send `text` to the current thread and wait for an atomic assistant reply
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        let admitted = match self.admit(text) {
            Ok(admitted) => admitted,
            Err(reason) => return Ok(SendOutcome::Dropped(reason)),
        };
        let thread_id = admitted.thread_id;
        let user_message_id = self.submit_user_message(&admitted).await?;

        let _typing = TypingGuard::begin(&self.store);
        if !self.config.reply_delay.is_zero() {
            tokio::time::sleep(self.config.reply_delay).await;
        }

        let prompt = self.config.render_reply(admitted.text.as_str());
        match self.service.send_assistant_message(thread_id, &prompt).await {
            Ok(reply) => {
                let reply_message_id = reply.id;
                self.store.apply(Mutation::AddMessage {
                    thread_id,
                    message: reply,
                });
                tracing::info!(thread_id, user_message_id, reply_message_id, "reply received");
                Ok(SendOutcome::Replied {
                    thread_id,
                    user_message_id,
                    reply_message_id,
                })
            }
            Err(e) => {
                self.fail("Failed to get assistant reply", &e);
                Err(e)
            }
        }
    }

    pub async fn send_message_streaming(&self, text: &str) -> Result<SendOutcome> {
        self.send_message_streaming_with(text, CancellationToken::new())
            .await
    }

    /// Streaming send that stops applying text once `cancel` fires
    ///
    /// Abandonment is not an error: partial text stays, `typing` is cleared
    /// and the outcome is [`SendOutcome::Abandoned`].
    pub async fn send_message_streaming_with(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<SendOutcome> {
        let admitted = match self.admit(text) {
            Ok(admitted) => admitted,
            Err(reason) => return Ok(SendOutcome::Dropped(reason)),
        };
        let thread_id = admitted.thread_id;
        let user_message_id = self.submit_user_message(&admitted).await?;

        let target = match self.open_stream_target(thread_id, user_message_id) {
            Ok(target) => target,
            Err(e @ ChatError::StreamInFlight { .. }) => {
                tracing::warn!(thread_id, user_message_id, error = %e, "reply dropped");
                return Ok(SendOutcome::Dropped(DropReason::ReplyInFlight));
            }
            Err(e) => {
                self.fail("Failed to stream assistant reply", &e);
                return Err(e);
            }
        };
        let reply_message_id = target.message_id;
        let _target = StreamTargetGuard::new(&self.store, target);
        let _typing = TypingGuard::begin(&self.store);

        let prompt = self.config.render_reply(admitted.text.as_str());
        let store = self.store.clone();
        let result = self
            .ingestor
            .ingest(thread_id, &prompt, &cancel, move |accumulated| {
                store.apply(Mutation::ReplaceMessageText {
                    thread_id,
                    message_id: reply_message_id,
                    text: accumulated.to_string(),
                });
            })
            .await;

        match result {
            Ok(IngestOutcome::Completed { chunks, .. }) => {
                tracing::info!(thread_id, reply_message_id, chunks, "streamed reply complete");
                Ok(SendOutcome::Replied {
                    thread_id,
                    user_message_id,
                    reply_message_id,
                })
            }
            Ok(IngestOutcome::Abandoned { chunks, .. }) => {
                tracing::info!(thread_id, reply_message_id, chunks, "streamed reply abandoned");
                Ok(SendOutcome::Abandoned {
                    thread_id,
                    user_message_id,
                    reply_message_id,
                })
            }
            Err(e) => {
                self.fail("Failed to stream assistant reply", &e);
                Err(e)
            }
        }
    }

    pub async fn toggle_thread(&self, thread_id: ThreadId) -> Result<()> {
        if let Err(e) = self.store.commit(Mutation::ToggleThreadActive(thread_id)) {
            tracing::debug!(thread_id, error = %e, "toggle ignored");
            return Ok(());
        }
        self.store.apply(Mutation::SetError(None));

        match self.config.toggle_mode {
            ToggleMode::LocalOnly => Ok(()),
            ToggleMode::PersistSnapshot => self.save_snapshot().await,
        }
    }

    /// Select a thread (or none) and refresh its messages
    ///
    /// An id that is not in the store is ignored.
    pub async fn set_current_thread(&self, thread_id: Option<ThreadId>) -> Result<()> {
        let Some(id) = thread_id else {
            self.store.apply(Mutation::SetCurrentThreadId(None));
            self.store.apply(Mutation::SetError(None));
            return Ok(());
        };

        if let Err(e) = self.store.commit(Mutation::SetCurrentThreadId(Some(id))) {
            tracing::debug!(thread_id = id, error = %e, "selection ignored");
            return Ok(());
        }
        self.load_messages(id).await
    }

    pub async fn save_snapshot(&self) -> Result<()> {
        let snapshots = self.snapshot_store()?;
        let threads = self.store.read(|s| s.all_threads().to_vec());

        match snapshots.save(&threads).await {
            Ok(()) => {
                tracing::debug!(threads = threads.len(), "snapshot saved");
                Ok(())
            }
            Err(e) => {
                self.fail("Failed to save conversations", &e);
                Err(e)
            }
        }
    }

    /// Replace threads with the saved snapshot. Returns false when none exists.
    pub async fn restore_snapshot(&self) -> Result<bool> {
        let snapshots = self.snapshot_store()?;

        match snapshots.load().await {
            Ok(Some(threads)) => {
                let first = threads.first().map(|t| t.id);
                self.store.apply(Mutation::SetThreads(threads));
                if self.store.read(|s| s.current_thread_id().is_none()) {
                    if let Some(id) = first {
                        self.store.apply(Mutation::SetCurrentThreadId(Some(id)));
                    }
                }
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.fail("Failed to restore conversations", &e);
                Err(e)
            }
        }
    }

    fn snapshot_store(&self) -> Result<&Arc<dyn SnapshotStore>> {
        self.snapshots
            .as_ref()
            .ok_or_else(|| ChatError::Snapshot("no snapshot store configured".to_string()))
    }

    fn admit(&self, text: &str) -> std::result::Result<AdmittedSend, DropReason> {
        let reason = match OutgoingText::new(text) {
            Err(_) => DropReason::EmptyText,
            Ok(text) => match self
                .store
                .read(|s| (s.current_thread_id(), s.streaming_target().is_some()))
            {
                (None, _) => DropReason::NoCurrentThread,
                (Some(_), true) => DropReason::ReplyInFlight,
                (Some(thread_id), false) => match self.reply_slot.try_acquire() {
                    None => DropReason::ReplyInFlight,
                    Some(permit) => {
                        return Ok(AdmittedSend {
                            thread_id,
                            text,
                            _permit: permit,
                        })
                    }
                },
            },
        };
        tracing::debug!(%reason, "send dropped");
        Err(reason)
    }

    async fn submit_user_message(&self, admitted: &AdmittedSend) -> Result<MessageId> {
        let thread_id = admitted.thread_id;
        self.store.apply(Mutation::SetError(None));

        let message = match self.service.send_user_message(thread_id, &admitted.text).await {
            Ok(message) => message,
            Err(e) => {
                self.fail("Failed to send message", &e);
                return Err(e);
            }
        };

        let message_id = message.id;
        self.store.apply(Mutation::AddMessage { thread_id, message });
        tracing::debug!(thread_id, message_id, "user message stored");
        Ok(message_id)
    }

    fn open_stream_target(
        &self,
        thread_id: ThreadId,
        user_message_id: MessageId,
    ) -> Result<StreamTarget> {
        let message_id = self
            .store
            .read(|s| self.config.stream_target.allocate(s, thread_id, user_message_id));

        self.store.commit(Mutation::BeginStream {
            thread_id,
            placeholder: Message::placeholder(message_id, self.store.now()),
        })?;
        Ok(StreamTarget {
            thread_id,
            message_id,
        })
    }

    fn fail(&self, context: &str, e: &ChatError) {
        tracing::error!(error = %e, "{}", context);
        self.store
            .apply(Mutation::SetError(Some(format!("{}: {}", context, e))));
    }
}

impl std::fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("config", &self.config)
            .field("reply_in_flight", &self.reply_slot.is_held())
            .finish_non_exhaustive()
    }
}
