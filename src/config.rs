//! Configuration types for the migration orchestrator.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a migration orchestrator.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// How to wait for the cluster to come back after the restart.
    pub restart_wait: RetryPolicy,

    /// Reindex settings.
    pub reindex: ReindexConfig,

    /// HTTP client settings.
    pub http: HttpConfig,

    /// Revoke the allowlist entry automatically when a run finishes.
    pub revoke_allowlist_on_finish: bool,

    /// Directory for the persisted "migration in progress" marker.
    /// `None` keeps the lock in memory only.
    pub lock_dir: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            restart_wait: RetryPolicy::default(),
            reindex: ReindexConfig::default(),
            http: HttpConfig::default(),
            revoke_allowlist_on_finish: false,
            lock_dir: None,
        }
    }
}

impl MigrationConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the restart wait policy.
    pub fn with_restart_wait(mut self, policy: RetryPolicy) -> Self {
        self.restart_wait = policy;
        self
    }

    /// Set reindex configuration.
    pub fn with_reindex_config(mut self, reindex: ReindexConfig) -> Self {
        self.reindex = reindex;
        self
    }

    /// Set HTTP configuration.
    pub fn with_http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Revoke the allowlist entry when a run finishes successfully.
    pub fn with_revoke_allowlist_on_finish(mut self, revoke: bool) -> Self {
        self.revoke_allowlist_on_finish = revoke;
        self
    }

    /// Persist the run lock under this directory.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Reject configurations that cannot produce a working run.
    pub fn validate(&self) -> Result<()> {
        if self.restart_wait.max_attempts == 0 {
            return Err(Error::Config(
                "restart wait max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reindex.shards == 0 {
            return Err(Error::Config(
                "destination index shards must be at least 1".to_string(),
            ));
        }
        if self.reindex.max_concurrent_indices == 0 {
            return Err(Error::Config(
                "max_concurrent_indices must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for creating destination indices and submitting reindex tasks.
#[derive(Debug, Clone)]
pub struct ReindexConfig {
    /// Primary shards for each pre-created destination index.
    pub shards: u32,

    /// Replicas for each pre-created destination index.
    pub replicas: u32,

    /// Connect timeout the engine uses when pulling from the remote.
    pub remote_connect_timeout: Duration,

    /// Socket timeout the engine uses when pulling from the remote.
    pub remote_socket_timeout: Duration,

    /// Indices reindexed at the same time. 1 reindexes sequentially.
    pub max_concurrent_indices: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            replicas: 0,
            remote_connect_timeout: Duration::from_secs(30),
            remote_socket_timeout: Duration::from_secs(30),
            max_concurrent_indices: 1,
        }
    }
}

impl ReindexConfig {
    /// Set destination shard and replica counts.
    pub fn with_topology(mut self, shards: u32, replicas: u32) -> Self {
        self.shards = shards;
        self.replicas = replicas;
        self
    }

    /// Set remote connect and socket timeouts.
    pub fn with_remote_timeouts(mut self, connect: Duration, socket: Duration) -> Self {
        self.remote_connect_timeout = connect;
        self.remote_socket_timeout = socket;
        self
    }

    /// Set how many indices may be reindexed concurrently.
    pub fn with_max_concurrent_indices(mut self, n: usize) -> Self {
        self.max_concurrent_indices = n;
        self
    }
}

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for the remote index listing request.
    pub request_timeout: Duration,

    /// Base URL of the local storage engine.
    pub local_engine_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            local_engine_url: "http://127.0.0.1:9200".to_string(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the local storage engine URL.
    pub fn with_local_engine_url(mut self, url: impl Into<String>) -> Self {
        self.local_engine_url = url.into();
        self
    }
}
