use colloquy_controller::ConversationController;
use colloquy_types::Result;

/// Where the conversation list came from at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSource {
    Remote,
    /// The service was unreachable; threads came from the snapshot, if any
    Snapshot,
    /// Neither the service nor the snapshot could be read
    Unavailable,
}

impl ThreadSource {
    /// Saving after an unavailable start would overwrite the snapshot with nothing
    pub fn allows_save(self) -> bool {
        self != ThreadSource::Unavailable
    }
}

/// Load threads from the service, falling back to the saved snapshot
pub async fn open(controller: &ConversationController) -> ThreadSource {
    match controller.load_threads().await {
        Ok(()) => return ThreadSource::Remote,
        Err(e) => tracing::warn!(error = %e, "could not reach chat service"),
    }

    if !controller.has_snapshots() {
        return ThreadSource::Unavailable;
    }
    match controller.restore_snapshot().await {
        Ok(true) => {
            tracing::info!("restored saved conversations");
            ThreadSource::Snapshot
        }
        Ok(false) => {
            tracing::debug!("no saved conversations");
            ThreadSource::Snapshot
        }
        Err(e) => {
            tracing::warn!(error = %e, "snapshot not restored");
            ThreadSource::Unavailable
        }
    }
}

/// Save the threads on exit unless the session never had any to save
pub async fn close(controller: &ConversationController, source: ThreadSource) -> Result<()> {
    if !controller.has_snapshots() {
        return Ok(());
    }
    if !source.allows_save() {
        tracing::warn!("no conversations were loaded, leaving snapshot untouched");
        return Ok(());
    }
    controller.save_snapshot().await
}
