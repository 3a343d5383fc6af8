//! Data node migration by remote reindex.
//!
//! This crate moves a running log-indexing cluster onto a new set of data
//! nodes. It:
//! - Lists the indices on the old cluster over its `_cat` API
//! - Opens a temporary allowlist entry for the old cluster
//! - Waits for the new cluster to come back from its restart
//! - Pulls every index across with the storage engine's reindex-from-remote
//!
//! # Features
//!
//! - Fire-and-forget runs with lock-free status reads
//! - Forward-only status with a recorded history
//! - Bounded, cancellable restart detection by membership snapshot
//! - Optional bounded per-index concurrency
//! - Single run per cluster, in memory or via a marker file
//! - A decision table for the surrounding upgrade workflow
//!
//! # Example
//!
//! ```rust,no_run
//! use datanode_migration::{
//!     EventBusAllowlist, InMemoryNodeRegistry, MigrationConfig, MigrationOrchestrator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(InMemoryNodeRegistry::new());
//!     let (gate, _events) = EventBusAllowlist::new();
//!
//!     let orchestrator =
//!         MigrationOrchestrator::from_config(MigrationConfig::default(), registry, gate).await?;
//!
//!     // Returns as soon as the run is spawned
//!     let handle = orchestrator
//!         .start("https://old-cluster:9200", "admin", "secret", vec![])
//!         .await?;
//!
//!     println!("Status: {}", orchestrator.status());
//!     let status = handle.wait().await?;
//!     println!("Finished with {}", status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Upgrade workflow                   │
//! │  MigrationActions (checks + mutations)      │
//! └─────────────────────────────────────────────┘
//!                     │ ReindexOldData
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │          MigrationOrchestrator              │
//! │  • start(uri, user, pass, indices)          │
//! │  • status() / progress()                    │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┬──────────────┐
//!     ▼               ▼               ▼              ▼
//! ┌─────────┐   ┌──────────┐   ┌───────────┐  ┌────────────┐
//! │  Index  │   │Allowlist │   │   Node    │  │  Storage   │
//! │ Lister  │   │  Gate    │   │ Registry  │  │  Engine    │
//! └─────────┘   └──────────┘   └───────────┘  └────────────┘
//! ```
//!
//! # Status
//!
//! A run moves `STARTING -> WAITING_FOR_RESTART -> REINDEXING -> FINISHED`,
//! or to `FAILED` from any non-terminal status. Running out of restart-wait
//! attempts is logged and does not fail the run.

pub mod allowlist;
pub mod certs;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod migration;
pub mod remote;
pub mod retry;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{HttpConfig, MigrationConfig, ReindexConfig};
pub use error::{CheckError, ConnectivityError, Error, Result};
pub use types::{Credentials, HostPort, NodeId, SourceUri};

// Re-export orchestration types
pub use migration::{
    is_all_indices, IndexSelector, MigrationAction, MigrationActions, MigrationOrchestrator,
    MigrationPath, MigrationProgress, MigrationStatus, RunHandle,
};

// Re-export collaborator seams
pub use allowlist::{AllowlistAction, AllowlistEvent, AllowlistGate, AllowlistState, EventBusAllowlist};
pub use certs::{CertRenewalService, DataNodeCertInfo, ProvisioningState};
pub use cluster::{InMemoryNodeRegistry, NodeRegistry, NodeSnapshot};
pub use remote::{HttpIndexLister, HttpStorageEngine, IndexLister, StorageEngine};
pub use retry::{RetryPolicy, RetryingWaiter, WaitOutcome};

// Re-export metrics types
pub use metrics::{MigrationMetrics, MigrationMetricsSnapshot};
