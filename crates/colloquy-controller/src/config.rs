use colloquy_remote::IngestConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::allocator::StreamTargetAllocator;

/// Title used when a thread is created without one
pub const DEFAULT_THREAD_TITLE: &str = "New conversation";

const DEFAULT_REPLY_TEMPLATE: &str = "Understood \"{text}\". How can I help you with that?";

/// What toggling a thread's activity does beyond the local mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToggleMode {
    LocalOnly,
    /// Save all threads through the snapshot store after each toggle
    PersistSnapshot,
}

impl Default for ToggleMode {
    fn default() -> Self {
        ToggleMode::LocalOnly
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub toggle_mode: ToggleMode,
    pub stream_target: StreamTargetAllocator,
    /// Text sent to the assistant endpoint; `{text}` is replaced by the user's message
    pub reply_template: String,
    /// Pause before requesting an atomic assistant reply
    pub reply_delay: Duration,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            toggle_mode: ToggleMode::default(),
            stream_target: StreamTargetAllocator::default(),
            reply_template: DEFAULT_REPLY_TEMPLATE.to_string(),
            reply_delay: Duration::ZERO,
            ingest: IngestConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toggle_mode(mut self, mode: ToggleMode) -> Self {
        self.toggle_mode = mode;
        self
    }

    pub fn with_stream_target(mut self, allocator: StreamTargetAllocator) -> Self {
        self.stream_target = allocator;
        self
    }

    pub fn with_reply_template(mut self, template: impl Into<String>) -> Self {
        self.reply_template = template.into();
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.ingest.open_timeout = timeout;
        self
    }

    pub fn render_reply(&self, text: &str) -> String {
        self.reply_template.replace("{text}", text)
    }
}
