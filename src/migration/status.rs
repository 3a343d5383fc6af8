//! Coarse migration status and its forward-only state cell.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Status of a migration run.
///
/// Variants are declared in progress order. A run only ever moves forward;
/// `Failed` is reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MigrationStatus {
    Starting = 0,
    Running = 1,
    WaitingForRestart = 2,
    Reindexing = 3,
    Finished = 4,
    Failed = 5,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationStatus::Starting => write!(f, "STARTING"),
            MigrationStatus::Running => write!(f, "RUNNING"),
            MigrationStatus::WaitingForRestart => write!(f, "WAITING_FOR_RESTART"),
            MigrationStatus::Reindexing => write!(f, "REINDEXING"),
            MigrationStatus::Finished => write!(f, "FINISHED"),
            MigrationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl MigrationStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Finished | MigrationStatus::Failed)
    }

    /// Whether a run may move from `self` to `next`.
    pub fn can_transition_to(&self, next: MigrationStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            MigrationStatus::Failed => true,
            _ => (next as u8) > (*self as u8),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => MigrationStatus::Starting,
            1 => MigrationStatus::Running,
            2 => MigrationStatus::WaitingForRestart,
            3 => MigrationStatus::Reindexing,
            4 => MigrationStatus::Finished,
            _ => MigrationStatus::Failed,
        }
    }
}

/// Atomically readable status with a transition history.
///
/// Reads never block. Transitions are serialized so the history matches the
/// order in which the status changed.
#[derive(Debug)]
pub struct StatusCell {
    value: AtomicU8,
    history: Mutex<Vec<MigrationStatus>>,
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCell {
    /// A cell in `Starting`.
    pub fn new() -> Self {
        Self {
            value: AtomicU8::new(MigrationStatus::Starting as u8),
            history: Mutex::new(vec![MigrationStatus::Starting]),
        }
    }

    /// Current status.
    pub fn get(&self) -> MigrationStatus {
        MigrationStatus::from_u8(self.value.load(Ordering::Acquire))
    }

    /// Move to `next`, rejecting regressions and exits from terminal states.
    pub fn advance(&self, next: MigrationStatus) -> Result<()> {
        let mut history = self.history.lock();
        let current = self.get();
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current,
                to: next,
            });
        }
        self.value.store(next as u8, Ordering::Release);
        history.push(next);
        tracing::debug!(from = %current, to = %next, "Migration status changed");
        Ok(())
    }

    /// Every status the cell has held, oldest first.
    pub fn history(&self) -> Vec<MigrationStatus> {
        self.history.lock().clone()
    }
}
