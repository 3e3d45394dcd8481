mod message;
mod thread;

pub use message::{Message, OutgoingText, Sender};
pub use thread::{validate_messages, Thread};

/// Thread identity; assigned once by whoever creates the thread and never reused
pub type ThreadId = i64;

/// Message identity, unique within its thread
pub type MessageId = i64;

/// Wall-clock instant, carried on the wire as epoch milliseconds
pub type Timestamp = chrono::DateTime<chrono::Utc>;
