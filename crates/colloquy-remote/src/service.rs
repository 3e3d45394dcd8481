use async_trait::async_trait;
use colloquy_types::{Message, OutgoingText, Result, Thread, ThreadId};
use futures::Stream;
use std::pin::Pin;

/// Raw body of a streamed reply, in arrival order
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Operations the conversation core consumes from the remote chat service
///
/// Implementations translate transport failures into `ChatError::Transport`,
/// shape mismatches into `ChatError::Validation`, and failures while reading
/// a stream body into `ChatError::Stream`.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn list_threads(&self) -> Result<Vec<Thread>>;

    async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread>;

    async fn list_messages(&self, thread_id: ThreadId) -> Result<Vec<Message>>;

    /// Server assigns the id and timestamp
    async fn send_user_message(&self, thread_id: ThreadId, text: &OutgoingText) -> Result<Message>;

    async fn send_assistant_message(&self, thread_id: ThreadId, text: &str) -> Result<Message>;

    /// Opens a streamed assistant reply; the error is returned before any byte is read
    async fn send_assistant_message_streaming(
        &self,
        thread_id: ThreadId,
        text: &str,
    ) -> Result<ByteStream>;

    async fn create_thread(&self, title: &str, first_message: &OutgoingText) -> Result<Thread>;
}
