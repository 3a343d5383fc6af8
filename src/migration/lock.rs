//! Single-run-per-cluster guard.
//!
//! A run takes the lock before it touches the allowlist or the local
//! cluster and gives it back once it reaches a terminal status. The file
//! implementation leaves a marker on disk so a second process sharing the
//! directory is refused too.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Name of the marker file inside the lock directory.
pub const LOCK_FILE_NAME: &str = "migration.lock";

/// Exclusive "migration in progress" marker.
#[async_trait]
pub trait MigrationLock: Send + Sync + std::fmt::Debug {
    /// Take the lock for `run_id`, failing with `MigrationInProgress` if held.
    async fn acquire(&self, run_id: Uuid) -> Result<()>;

    /// Give the lock back. Releasing a lock held by another run is an error.
    async fn release(&self, run_id: Uuid) -> Result<()>;

    /// Run currently holding the lock.
    async fn holder(&self) -> Result<Option<Uuid>>;
}

/// Process-local lock.
#[derive(Debug, Default)]
pub struct InMemoryMigrationLock {
    holder: Mutex<Option<Uuid>>,
}

impl InMemoryMigrationLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationLock for InMemoryMigrationLock {
    async fn acquire(&self, run_id: Uuid) -> Result<()> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) => Err(Error::MigrationInProgress(format!(
                "run {} holds the migration lock",
                current
            ))),
            None => {
                *holder = Some(run_id);
                Ok(())
            }
        }
    }

    async fn release(&self, run_id: Uuid) -> Result<()> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current == run_id => {
                *holder = None;
                Ok(())
            }
            Some(current) => Err(Error::Storage(format!(
                "run {} cannot release lock held by {}",
                run_id, current
            ))),
            None => Ok(()),
        }
    }

    async fn holder(&self) -> Result<Option<Uuid>> {
        Ok(*self.holder.lock())
    }
}

/// Contents of the lock marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockMarker {
    run_id: [u8; 16],
    acquired_at_ms: i64,
}

/// Lock backed by a marker file created with `create_new`.
#[derive(Debug)]
pub struct FileMigrationLock {
    path: PathBuf,
}

impl FileMigrationLock {
    /// Use `dir` for the marker, creating it if needed.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create lock dir: {}", e)))?;
        Ok(Self {
            path: dir.join(LOCK_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_marker(&self) -> Result<Option<LockMarker>> {
        match fs::read(&self.path).await {
            Ok(content) => Ok(Some(bincode::deserialize(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read lock marker: {}", e))),
        }
    }
}

#[async_trait]
impl MigrationLock for FileMigrationLock {
    async fn acquire(&self, run_id: Uuid) -> Result<()> {
        let marker = LockMarker {
            run_id: *run_id.as_bytes(),
            acquired_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let content = bincode::serialize(&marker)?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = self
                    .read_marker()
                    .await?
                    .map(|m| Uuid::from_bytes(m.run_id).to_string())
                    .unwrap_or_else(|| "unknown run".to_string());
                return Err(Error::MigrationInProgress(format!(
                    "{} holds {}",
                    holder,
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(Error::Storage(format!("Failed to create lock marker: {}", e)))
            }
        };

        file.write_all(&content)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write lock marker: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| Error::Storage(format!("Failed to sync lock marker: {}", e)))?;

        tracing::debug!(run_id = %run_id, path = %self.path.display(), "Acquired migration lock");
        Ok(())
    }

    async fn release(&self, run_id: Uuid) -> Result<()> {
        match self.read_marker().await? {
            None => Ok(()),
            Some(marker) if Uuid::from_bytes(marker.run_id) == run_id => {
                fs::remove_file(&self.path)
                    .await
                    .map_err(|e| Error::Storage(format!("Failed to remove lock marker: {}", e)))?;
                tracing::debug!(run_id = %run_id, "Released migration lock");
                Ok(())
            }
            Some(marker) => Err(Error::Storage(format!(
                "run {} cannot release lock held by {}",
                run_id,
                Uuid::from_bytes(marker.run_id)
            ))),
        }
    }

    async fn holder(&self) -> Result<Option<Uuid>> {
        Ok(self
            .read_marker()
            .await?
            .map(|marker| Uuid::from_bytes(marker.run_id)))
    }
}
