//! Persisted state of the outer migration workflow.
//!
//! Records which path was chosen and which one-shot mutations already ran so
//! a repeated transition does not touch external systems twice.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File name of the persisted state inside the state directory.
pub const STATE_FILE_NAME: &str = "migration_state.json";

/// How the cluster is moved to the new topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationPath {
    /// Upgrade nodes in place.
    RollingUpgrade,
    /// Stand up new nodes and pull data from the old cluster.
    RemoteReindex,
}

impl std::fmt::Display for MigrationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationPath::RollingUpgrade => write!(f, "ROLLING_UPGRADE"),
            MigrationPath::RemoteReindex => write!(f, "REMOTE_REINDEX"),
        }
    }
}

/// Workflow state shared by all migration actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    /// Selected path, once chosen.
    pub path: Option<MigrationPath>,
    /// Message processing has been paused and not resumed yet.
    pub message_processing_paused: bool,
    /// A remote reindex run was triggered.
    pub reindex_started: bool,
}

/// Storage for [`MigrationState`].
#[async_trait]
pub trait MigrationStateStore: Send + Sync + std::fmt::Debug {
    /// Load the state; `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<MigrationState>>;

    /// Replace the stored state.
    async fn save(&self, state: &MigrationState) -> Result<()>;

    /// Forget the stored state.
    async fn remove(&self) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryMigrationStateStore {
    state: RwLock<Option<MigrationState>>,
}

impl InMemoryMigrationStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationStateStore for InMemoryMigrationStateStore {
    async fn load(&self) -> Result<Option<MigrationState>> {
        Ok(self.state.read().clone())
    }

    async fn save(&self, state: &MigrationState) -> Result<()> {
        *self.state.write() = Some(state.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.state.write() = None;
        Ok(())
    }
}

/// Store writing a JSON document, replaced atomically on every save.
#[derive(Debug)]
pub struct FileMigrationStateStore {
    path: PathBuf,
}

impl FileMigrationStateStore {
    /// Keep the state under `dir`, creating it if needed.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create state dir: {}", e)))?;
        Ok(Self {
            path: dir.join(STATE_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a temp file, then rename over the target.
    async fn atomic_write(&self, content: &[u8]) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;
        file.write_all(content)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to rename state file: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl MigrationStateStore for FileMigrationStateStore {
    async fn load(&self) -> Result<Option<MigrationState>> {
        match fs::read(&self.path).await {
            Ok(content) => {
                let state = serde_json::from_slice(&content).map_err(|e| {
                    Error::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
                })?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read state: {}", e))),
        }
    }

    async fn save(&self, state: &MigrationState) -> Result<()> {
        let content = serde_json::to_vec_pretty(state)?;
        self.atomic_write(&content).await?;
        tracing::debug!(path = %self.path.display(), ?state, "Saved migration state");
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to remove state: {}", e))),
        }
    }
}
