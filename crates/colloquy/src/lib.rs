//! # Colloquy
//!
//! Client-side conversation state engine for chat applications.
//!
//! ## Overview
//!
//! Colloquy owns the canonical in-memory view of conversation threads and
//! their messages, and keeps it consistent while replies arrive from a remote
//! chat service either whole or as a chunked text stream.
//!
//! - **Store**: one shared state container, changed only through a closed set of mutations
//! - **Flows**: load, create, send and streamed send, each leaving `loading`/`typing` cleared
//! - **Streaming**: UTF-8 safe chunk decoding with full-text progress updates
//! - **Snapshots**: plain serializable state for an external persistence layer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colloquy::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ChatError> {
//!     let service = Arc::new(HttpChatService::new(RemoteConfig::new("http://localhost:8000"))?);
//!     let controller = ConversationController::builder()
//!         .service(service)
//!         .build()?;
//!
//!     controller.load_threads().await?;
//!     controller.send_message_streaming("Hello!").await?;
//!
//!     controller.store().read(|state| {
//!         if let Some(thread) = state.current_thread() {
//!             for message in &thread.messages {
//!                 println!("{}: {}", message.sender, message.text);
//!             }
//!         }
//!     });
//!     Ok(())
//! }
//! ```
//!
//! Custom services and snapshot stores implement the async traits through
//! the re-exported [`async_trait`] macro.
//!
//! ## Architecture
//!
//! - **`colloquy-types`**: threads, messages, ids and the error enum
//! - **`colloquy-store`**: state, projections, mutations and snapshot stores
//! - **`colloquy-remote`**: the chat service boundary, HTTP client and stream ingestion
//! - **`colloquy-controller`**: conversation flows over the store
//!
//! ## License
//!
//! MIT

// Re-export all public APIs
pub use colloquy_controller as controller;
pub use colloquy_remote as remote;
pub use colloquy_store as store;
pub use colloquy_types as types;

pub use async_trait::async_trait;

pub use colloquy_types::{
    validate_messages, ChatError, Message, MessageId, OutgoingText, Result, Sender, Thread,
    ThreadId, Timestamp,
};

pub use colloquy_store::{
    ChatState, Clock, JsonFileSnapshotStore, ManualClock, MemorySnapshotStore, Mutation,
    SnapshotStore, Store, StreamTarget, SystemClock,
};

pub use colloquy_remote::{
    decode_text_stream, ByteStream, CancellationToken, ChatService, HttpChatService,
    IngestConfig, IngestOutcome, RemoteConfig, StreamIngestor, TextChunkStream,
    Utf8StreamDecoder,
};

pub use colloquy_controller::{
    ControllerBuilder, ControllerConfig, ConversationController, DropReason, ReplySlot,
    SendOutcome, StreamTargetAllocator, ToggleMode,
};

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::{
        async_trait, CancellationToken, ChatError, ChatService, ChatState, ControllerConfig,
        ConversationController, DropReason, HttpChatService, Message, Mutation, RemoteConfig,
        SendOutcome, Sender, SnapshotStore, Store, Thread, ThreadId, ToggleMode,
    };
}
