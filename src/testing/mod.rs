//! In-memory fakes for the migration seams.
//!
//! - [`RecordingStorageEngine`] records index creations and reindex requests
//! - [`StaticIndexLister`] returns a fixed listing or a fixed failure
//! - [`ScriptedNodeRegistry`] replays a sequence of membership snapshots
//! - [`http_stub`] is a throwaway HTTP/1.1 server for the reqwest clients

pub(crate) mod http_stub;

use crate::cluster::{NodeRegistry, NodeSnapshot};
use crate::error::{ConnectivityError, Error, Result};
use crate::remote::{IndexLister, ReindexRequest, ReindexResponse, StorageEngine};
use crate::types::{Credentials, SourceUri};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Install a test subscriber once; later calls are ignored.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Storage engine that records calls instead of talking to a cluster.
#[derive(Debug, Default)]
pub(crate) struct RecordingStorageEngine {
    created: Mutex<Vec<(String, u32, u32)>>,
    requests: Mutex<Vec<ReindexRequest>>,
    fail_create: HashSet<String>,
    fail_reindex: HashSet<String>,
    reindex_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `create_index` for `index`.
    pub fn fail_create(mut self, index: &str) -> Self {
        self.fail_create.insert(index.to_string());
        self
    }

    /// Fail `reindex` for `index`.
    pub fn fail_reindex(mut self, index: &str) -> Self {
        self.fail_reindex.insert(index.to_string());
        self
    }

    /// Make every reindex take `delay`.
    pub fn with_reindex_delay(mut self, delay: Duration) -> Self {
        self.reindex_delay = Some(delay);
        self
    }

    pub fn created_indices(&self) -> Vec<(String, u32, u32)> {
        self.created.lock().clone()
    }

    pub fn reindex_requests(&self) -> Vec<ReindexRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of reindex calls seen running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageEngine for RecordingStorageEngine {
    async fn create_index(&self, index: &str, shards: u32, replicas: u32) -> Result<()> {
        if self.fail_create.contains(index) {
            return Err(ConnectivityError::IndexCreationFailed {
                index: index.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.created
            .lock()
            .push((index.to_string(), shards, replicas));
        Ok(())
    }

    async fn reindex(&self, request: &ReindexRequest) -> Result<ReindexResponse> {
        self.requests.lock().push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.reindex_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_reindex.contains(&request.source.index) {
            return Err(ConnectivityError::ReindexFailed {
                index: request.source.index.clone(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(ReindexResponse {
            total: 10,
            created: 10,
            ..Default::default()
        })
    }
}

/// Lister returning a fixed result.
#[derive(Debug)]
pub(crate) struct StaticIndexLister {
    indices: Vec<String>,
    fail_status: Option<u16>,
    calls: AtomicU32,
}

impl StaticIndexLister {
    pub fn new(indices: &[&str]) -> Self {
        Self {
            indices: indices.iter().map(|s| s.to_string()).collect(),
            fail_status: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Answer every listing with HTTP `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            indices: Vec::new(),
            fail_status: Some(status),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexLister for StaticIndexLister {
    async fn list(&self, source: &SourceUri, _credentials: &Credentials) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_status {
            Some(status) => Err(Error::Connectivity(ConnectivityError::UnexpectedStatus {
                url: format!("{}_cat/indices?h=index", source.base_url()),
                status,
            })),
            None => Ok(self.indices.clone()),
        }
    }
}

/// Registry replaying snapshots in order; the last one repeats forever.
#[derive(Debug)]
pub(crate) struct ScriptedNodeRegistry {
    script: Mutex<VecDeque<Result<NodeSnapshot>>>,
    last: Mutex<NodeSnapshot>,
    calls: AtomicU32,
}

impl ScriptedNodeRegistry {
    pub fn new(snapshots: &[&[&str]]) -> Self {
        Self::from_results(
            snapshots
                .iter()
                .map(|nodes| Ok(NodeSnapshot::new(nodes.iter().copied())))
                .collect(),
        )
    }

    pub fn from_results(script: Vec<Result<NodeSnapshot>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(NodeSnapshot::default()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeRegistry for ScriptedNodeRegistry {
    async fn active_nodes(&self) -> Result<NodeSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Ok(snapshot)) => {
                *self.last.lock() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.lock().clone()),
        }
    }
}
