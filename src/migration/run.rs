//! One migration attempt and its per-index work items.

use super::status::{MigrationStatus, StatusCell};
use crate::error::{Error, Result};
use crate::types::{Credentials, HostPort, SourceUri};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Token that selects every index on the source cluster.
pub const ALL_INDICES_TOKEN: &str = "*";

/// True if `indices` asks for every index: empty, or exactly `["*"]`.
pub fn is_all_indices(indices: &[String]) -> bool {
    match indices {
        [] => true,
        [only] => only == ALL_INDICES_TOKEN,
        _ => false,
    }
}

/// Which indices a run migrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexSelector {
    /// Everything the source cluster lists.
    All,
    /// Exactly these indices, in this order.
    Explicit(Vec<String>),
}

impl IndexSelector {
    pub fn from_list(indices: Vec<String>) -> Self {
        if is_all_indices(&indices) {
            IndexSelector::All
        } else {
            IndexSelector::Explicit(indices)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, IndexSelector::All)
    }
}

/// A single source index to copy into an identically named destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexMigrationTask {
    pub source_index: String,
    pub dest_index: String,
    /// Shards for the pre-created destination index.
    pub shards: u32,
    /// Replicas for the pre-created destination index.
    pub replicas: u32,
}

impl IndexMigrationTask {
    pub fn new(index: impl Into<String>, shards: u32, replicas: u32) -> Self {
        let index = index.into();
        Self {
            dest_index: index.clone(),
            source_index: index,
            shards,
            replicas,
        }
    }

    /// Tasks are identified by their source index.
    pub fn id(&self) -> &str {
        &self.source_index
    }
}

/// How the restart wait of a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartWait {
    /// Every pre-restart node was seen again.
    Settled { attempts: u32 },
    /// Attempts ran out; the run continued anyway.
    Exhausted { attempts: u32 },
    /// An operator skipped the wait.
    Overridden,
}

/// State of one orchestration attempt.
///
/// Shared between the worker task and readers; every field is either
/// immutable or behind its own lock so `progress()` never waits on the worker.
#[derive(Debug)]
pub struct MigrationRun {
    id: Uuid,
    source: SourceUri,
    credentials: Credentials,
    selector: IndexSelector,
    status: StatusCell,
    resolved: RwLock<Option<Vec<String>>>,
    completed: RwLock<Vec<String>>,
    failed_index: RwLock<Option<String>>,
    last_error: RwLock<Option<String>>,
    restart_wait: RwLock<Option<RestartWait>>,
    gate_opened: AtomicBool,
    started_at: Instant,
    finished_after: RwLock<Option<Duration>>,
    cancellation: CancellationToken,
    restart_override: CancellationToken,
}

impl MigrationRun {
    pub fn new(source: SourceUri, credentials: Credentials, selector: IndexSelector) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            credentials,
            selector,
            status: StatusCell::new(),
            resolved: RwLock::new(None),
            completed: RwLock::new(Vec::new()),
            failed_index: RwLock::new(None),
            last_error: RwLock::new(None),
            restart_wait: RwLock::new(None),
            gate_opened: AtomicBool::new(false),
            started_at: Instant::now(),
            finished_after: RwLock::new(None),
            cancellation: CancellationToken::new(),
            restart_override: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceUri {
        &self.source
    }

    pub fn host_port(&self) -> HostPort {
        self.source.host_port()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn selector(&self) -> &IndexSelector {
        &self.selector
    }

    pub fn status(&self) -> MigrationStatus {
        self.status.get()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.get().is_terminal()
    }

    pub fn advance(&self, next: MigrationStatus) -> Result<()> {
        self.status.advance(next)
    }

    /// Index list once resolved.
    pub fn resolved_indices(&self) -> Option<Vec<String>> {
        self.resolved.read().clone()
    }

    pub fn set_resolved(&self, indices: Vec<String>) {
        *self.resolved.write() = Some(indices);
    }

    pub fn record_completed(&self, index: &str) {
        self.completed.write().push(index.to_string());
    }

    pub fn record_index_failure(&self, index: &str) {
        *self.failed_index.write() = Some(index.to_string());
    }

    pub fn record_restart_wait(&self, outcome: RestartWait) {
        *self.restart_wait.write() = Some(outcome);
    }

    pub fn restart_wait(&self) -> Option<RestartWait> {
        *self.restart_wait.read()
    }

    pub fn mark_gate_opened(&self) {
        self.gate_opened.store(true, Ordering::Release);
    }

    pub fn gate_opened(&self) -> bool {
        self.gate_opened.load(Ordering::Acquire)
    }

    /// Fails unless the gate is open and the restart wait has ended.
    pub fn ensure_ready_for_reindex(&self) -> Result<()> {
        if !self.gate_opened() {
            return Err(Error::Internal(format!(
                "run {} tried to reindex before allowing {}",
                self.id,
                self.host_port()
            )));
        }
        if self.restart_wait().is_none() {
            return Err(Error::Internal(format!(
                "run {} tried to reindex before the restart wait ended",
                self.id
            )));
        }
        Ok(())
    }

    /// Move to `Finished`.
    pub fn finish(&self) -> Result<()> {
        self.status.advance(MigrationStatus::Finished)?;
        *self.finished_after.write() = Some(self.started_at.elapsed());
        Ok(())
    }

    /// Record `error` and move to `Failed`.
    pub fn fail(&self, error: &Error) {
        *self.last_error.write() = Some(error.to_string());
        if let Err(e) = self.status.advance(MigrationStatus::Failed) {
            tracing::warn!(run_id = %self.id, error = %e, "Run already terminal");
        }
        *self.finished_after.write() = Some(self.started_at.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        let finished_after = *self.finished_after.read();
        finished_after.unwrap_or_else(|| self.started_at.elapsed())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Stop waiting for the restart and go straight to reindexing.
    pub fn override_restart_wait(&self) {
        self.restart_override.cancel();
    }

    pub fn restart_override_token(&self) -> CancellationToken {
        self.restart_override.clone()
    }

    pub fn progress(&self) -> MigrationProgress {
        MigrationProgress {
            run_id: self.id,
            source: self.source.to_string(),
            status: self.status.get(),
            history: self.status.history(),
            resolved_indices: self.resolved.read().clone(),
            completed_indices: self.completed.read().clone(),
            failed_index: self.failed_index.read().clone(),
            last_error: self.last_error.read().clone(),
            restart_wait: *self.restart_wait.read(),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Point-in-time view of a run for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub run_id: Uuid,
    pub source: String,
    pub status: MigrationStatus,
    pub history: Vec<MigrationStatus>,
    pub resolved_indices: Option<Vec<String>>,
    pub completed_indices: Vec<String>,
    pub failed_index: Option<String>,
    pub last_error: Option<String>,
    pub restart_wait: Option<RestartWait>,
    pub elapsed_ms: u64,
}

impl MigrationProgress {
    /// The last index that was copied successfully.
    pub fn last_completed_index(&self) -> Option<&str> {
        self.completed_indices.last().map(String::as_str)
    }
}
