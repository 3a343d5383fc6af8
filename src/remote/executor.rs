//! Per-index remote reindex.

use super::engine::{RemoteInfo, ReindexRequest, ReindexResponse, StorageEngine};
use crate::config::ReindexConfig;
use crate::error::Result;
use crate::migration::run::IndexMigrationTask;
use crate::types::{Credentials, SourceUri};
use std::sync::Arc;
use std::time::Instant;

/// Creates the destination index and pulls one index from the remote cluster.
#[derive(Debug, Clone)]
pub struct RemoteReindexExecutor {
    engine: Arc<dyn StorageEngine>,
    config: ReindexConfig,
}

impl RemoteReindexExecutor {
    pub fn new(engine: Arc<dyn StorageEngine>, config: ReindexConfig) -> Self {
        Self { engine, config }
    }

    /// Reindex settings in use.
    pub fn config(&self) -> &ReindexConfig {
        &self.config
    }

    /// Build the task for `index` using the configured topology.
    pub fn task_for(&self, index: &str) -> IndexMigrationTask {
        IndexMigrationTask::new(index, self.config.shards, self.config.replicas)
    }

    /// Pre-create the destination index, then copy every document into it.
    pub async fn reindex(
        &self,
        source: &SourceUri,
        credentials: &Credentials,
        task: &IndexMigrationTask,
    ) -> Result<ReindexResponse> {
        let started = Instant::now();

        self.engine
            .create_index(&task.dest_index, task.shards, task.replicas)
            .await?;

        let remote = RemoteInfo::new(
            source,
            credentials,
            self.config.remote_socket_timeout,
            self.config.remote_connect_timeout,
        );
        let request = ReindexRequest::match_all(remote, &task.source_index, &task.dest_index);

        let response = self.engine.reindex(&request).await?;

        tracing::info!(
            index = %task.source_index,
            created = response.created,
            updated = response.updated,
            duration_ms = started.elapsed().as_millis() as u64,
            "Reindexed index from remote"
        );

        Ok(response)
    }
}
