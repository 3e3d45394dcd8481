pub mod allocator;
pub mod builder;
pub mod config;
pub mod controller;
pub mod guard;
pub mod outcome;

pub use allocator::StreamTargetAllocator;
pub use builder::ControllerBuilder;
pub use config::{ControllerConfig, ToggleMode, DEFAULT_THREAD_TITLE};
pub use controller::ConversationController;
pub use guard::{ReplyPermit, ReplySlot};
pub use outcome::{DropReason, SendOutcome};

pub use tokio_util::sync::CancellationToken;
