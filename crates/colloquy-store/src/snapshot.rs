use async_trait::async_trait;
use colloquy_types::{ChatError, Result, Thread};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Boundary to whatever keeps threads between sessions
///
/// The store never calls this on its own; flows that want durability save
/// explicitly.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, threads: &[Thread]) -> Result<()>;

    /// `None` when nothing has been saved yet
    async fn load(&self) -> Result<Option<Vec<Thread>>>;
}

/// In-process snapshot, mostly for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    saved: RwLock<Option<Vec<Thread>>>,
    saves: RwLock<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(threads: Vec<Thread>) -> Self {
        Self {
            saved: RwLock::new(Some(threads)),
            saves: RwLock::new(0),
        }
    }

    pub async fn saved(&self) -> Option<Vec<Thread>> {
        self.saved.read().await.clone()
    }

    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, threads: &[Thread]) -> Result<()> {
        *self.saved.write().await = Some(threads.to_vec());
        *self.saves.write().await += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<Thread>>> {
        Ok(self.saved.read().await.clone())
    }
}

/// Threads as a pretty-printed JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn save(&self, threads: &[Thread]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(threads)
            .map_err(|e| ChatError::Snapshot(format!("Failed to encode snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ChatError::Snapshot(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| ChatError::Snapshot(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ChatError::Snapshot(format!("Failed to replace {}: {}", self.path.display(), e)))?;

        tracing::debug!(path = %self.path.display(), threads = threads.len(), "snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<Thread>>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ChatError::Snapshot(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let threads: Vec<Thread> = serde_json::from_slice(&bytes)
            .map_err(|e| ChatError::Snapshot(format!("Corrupt snapshot: {}", e)))?;
        for thread in &threads {
            thread.validate()?;
        }
        Ok(Some(threads))
    }
}
