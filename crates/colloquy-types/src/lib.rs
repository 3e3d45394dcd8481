pub mod error;
pub mod models;

pub use error::{ChatError, Result};
pub use models::{
    validate_messages, Message, MessageId, OutgoingText, Sender, Thread, ThreadId, Timestamp,
};
