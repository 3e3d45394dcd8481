use colloquy_remote::ChatService;
use colloquy_store::{SnapshotStore, Store};
use colloquy_types::{ChatError, Result};
use std::sync::Arc;

use crate::config::{ControllerConfig, ToggleMode};
use crate::controller::ConversationController;

/// Builder for a [`ConversationController`] with optional collaborators
pub struct ControllerBuilder {
    store: Option<Store>,
    service: Option<Arc<dyn ChatService>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    config: ControllerConfig,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            service: None,
            snapshots: None,
            config: ControllerConfig::default(),
        }
    }

    /// Share an existing store; a fresh one is created otherwise
    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn service(mut self, service: Arc<dyn ChatService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn build(self) -> Result<ConversationController> {
        let service = self
            .service
            .ok_or_else(|| ChatError::Validation("chat service is required".to_string()))?;

        if self.config.toggle_mode == ToggleMode::PersistSnapshot && self.snapshots.is_none() {
            return Err(ChatError::Validation(
                "persist_snapshot toggle mode needs a snapshot store".to_string(),
            ));
        }

        Ok(ConversationController::with_parts(
            self.store.unwrap_or_default(),
            service,
            self.snapshots,
            self.config,
        ))
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
