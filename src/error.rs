//! Error types for the migration orchestrator.

use crate::migration::MigrationStatus;
use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the migration orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors, raised before any side effect happens.
    #[error("config error: {0}")]
    Config(String),

    /// Remote or local cluster could not be reached or rejected a request.
    #[error("connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// A precondition check failed or could not be evaluated.
    #[error("check error: {0}")]
    Check(#[from] CheckError),

    /// A wait was interrupted before it finished.
    #[error("operation cancelled")]
    Cancelled,

    /// Another migration run holds the cluster lock.
    #[error("migration already in progress: {0}")]
    MigrationInProgress(String),

    /// No migration run exists.
    #[error("no migration run")]
    NoMigrationRun,

    /// Attempted to move a run backwards or out of a terminal state.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MigrationStatus,
        to: MigrationStatus,
    },

    /// Persistent state or lock storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is an interruption rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Errors talking to the remote source cluster or the local storage engine.
#[derive(Error, Debug)]
pub enum ConnectivityError {
    /// Request could not be sent or the connection broke.
    #[error("request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// Server answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// Destination index could not be created.
    #[error("failed to create index {index}: {reason}")]
    IndexCreationFailed { index: String, reason: String },

    /// The reindex task was rejected or reported failures.
    #[error("reindex of {index} failed: {reason}")]
    ReindexFailed { index: String, reason: String },
}

/// Errors from migration precondition checks.
#[derive(Error, Debug)]
pub enum CheckError {
    /// The check ran and its condition does not hold yet. Operators can fix
    /// the environment and retry.
    #[error("check {check} failed: {reason}")]
    Failed { check: &'static str, reason: String },

    /// The check itself could not be evaluated. This is a tooling bug and
    /// halts the surrounding workflow.
    #[error("check {check} erroneous: {reason}")]
    Erroneous { check: &'static str, reason: String },
}

impl CheckError {
    /// Whether retrying the check later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckError::Failed { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("json error: {}", e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Storage(format!("encoding error: {}", e))
    }
}
