//! Local storage engine operations used by the migration.
//!
//! Two calls are needed: pre-create a destination index with a fixed
//! shard/replica layout, and submit a reindex task that pulls documents from
//! a remote cluster. [`HttpStorageEngine`] speaks the engine's REST API;
//! tests plug in recording fakes through the [`StorageEngine`] trait.

use crate::error::{ConnectivityError, Error, Result};
use crate::types::{Credentials, SourceUri};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Remote source descriptor of a reindex request.
#[derive(Clone, Serialize, PartialEq)]
pub struct RemoteInfo {
    /// `scheme://host:port[/path]` of the remote cluster.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Extra headers sent with every remote request.
    pub headers: BTreeMap<String, String>,
    pub socket_timeout: String,
    pub connect_timeout: String,
}

impl RemoteInfo {
    /// Describe `source` with basic credentials and explicit timeouts.
    pub fn new(
        source: &SourceUri,
        credentials: &Credentials,
        socket_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let path = match source.path() {
            "/" => "",
            p => p.trim_end_matches('/'),
        };
        Self {
            host: format!(
                "{}://{}:{}{}",
                source.scheme(),
                source.host(),
                source.port(),
                path
            ),
            username: credentials.username().to_string(),
            password: credentials.password().to_string(),
            headers: BTreeMap::new(),
            socket_timeout: format_time_value(socket_timeout),
            connect_timeout: format_time_value(connect_timeout),
        }
    }
}

impl std::fmt::Debug for RemoteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteInfo")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("socket_timeout", &self.socket_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Engine time-unit string for a duration (`30s`, `1500ms`).
pub fn format_time_value(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReindexSource {
    pub remote: RemoteInfo,
    pub index: String,
    pub query: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReindexDest {
    pub index: String,
}

/// Body of a reindex-from-remote request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReindexRequest {
    pub source: ReindexSource,
    pub dest: ReindexDest,
}

impl ReindexRequest {
    /// Copy every document of `source_index` on the remote into `dest_index`.
    pub fn match_all(remote: RemoteInfo, source_index: &str, dest_index: &str) -> Self {
        Self {
            source: ReindexSource {
                remote,
                index: source_index.to_string(),
                query: match_all_query(),
            },
            dest: ReindexDest {
                index: dest_index.to_string(),
            },
        }
    }
}

/// `{"match_all": {}}`
pub fn match_all_query() -> serde_json::Value {
    serde_json::json!({ "match_all": {} })
}

/// Path of the blocking reindex endpoint, relative to the engine base URL.
pub const REINDEX_PATH: &str = "_reindex?wait_for_completion=true";

/// Summary returned by the engine for a finished reindex task.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReindexResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub failures: Vec<serde_json::Value>,
    /// Only set when the engine ran the task in the background.
    #[serde(default)]
    pub task: Option<String>,
}

/// Operations the migration needs from the local storage engine.
#[async_trait]
pub trait StorageEngine: Send + Sync + std::fmt::Debug {
    /// Create `index` with the given primary shard and replica counts.
    async fn create_index(&self, index: &str, shards: u32, replicas: u32) -> Result<()>;

    /// Run a reindex task to completion.
    async fn reindex(&self, request: &ReindexRequest) -> Result<ReindexResponse>;
}

/// [`StorageEngine`] talking to the engine's REST API.
#[derive(Debug, Clone)]
pub struct HttpStorageEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStorageEngine {
    /// Create a client for the engine at `base_url`.
    ///
    /// Reindex calls may run for minutes, so no overall request timeout is set.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl StorageEngine for HttpStorageEngine {
    async fn create_index(&self, index: &str, shards: u32, replicas: u32) -> Result<()> {
        let url = self.url(index);
        let body = serde_json::json!({
            "settings": {
                "index": {
                    "number_of_shards": shards,
                    "number_of_replicas": replicas,
                }
            }
        });

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConnectivityError::IndexCreationFailed {
                index: index.to_string(),
                reason: format!("request to {} failed: {}", url, e),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index, shards, replicas, "Created destination index");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        // Left over from an earlier partial run; reindexing into it is fine.
        if status.as_u16() == 400 && text.contains("resource_already_exists_exception") {
            tracing::warn!(index, "Destination index already exists, reusing it");
            return Ok(());
        }

        Err(ConnectivityError::IndexCreationFailed {
            index: index.to_string(),
            reason: format!("status {}: {}", status.as_u16(), text),
        }
        .into())
    }

    async fn reindex(&self, request: &ReindexRequest) -> Result<ReindexResponse> {
        let url = self.url(REINDEX_PATH);
        let index = request.dest.index.clone();

        tracing::info!(
            source_index = %request.source.index,
            dest_index = %index,
            remote = %request.source.remote.host,
            "Submitting remote reindex"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ConnectivityError::ReindexFailed {
                index: index.clone(),
                reason: format!("request to {} failed: {}", url, e),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectivityError::ReindexFailed {
                index: index.clone(),
                reason: format!("failed to read response from {}: {}", url, e),
            })?;

        if !status.is_success() {
            return Err(ConnectivityError::ReindexFailed {
                index,
                reason: format!("status {}: {}", status.as_u16(), text),
            }
            .into());
        }

        let parsed: ReindexResponse =
            serde_json::from_str(&text).map_err(|e| ConnectivityError::ReindexFailed {
                index: index.clone(),
                reason: format!("unparseable response: {}", e),
            })?;

        // A bare task handle means nothing has been copied yet
        if let Some(task) = &parsed.task {
            return Err(ConnectivityError::ReindexFailed {
                index,
                reason: format!("engine returned task {} instead of a finished result", task),
            }
            .into());
        }

        if !parsed.failures.is_empty() {
            return Err(ConnectivityError::ReindexFailed {
                index,
                reason: format!("{} document failures", parsed.failures.len()),
            }
            .into());
        }

        Ok(parsed)
    }
}
