//! Listing indices on the remote source cluster.

use crate::config::HttpConfig;
use crate::error::{ConnectivityError, Error, Result};
use crate::types::{Credentials, SourceUri};
use async_trait::async_trait;

/// Path of the administrative index catalogue, relative to the cluster base URL.
pub const CAT_INDICES_PATH: &str = "_cat/indices?h=index";

/// Lists the indices visible on a remote cluster.
#[async_trait]
pub trait IndexLister: Send + Sync + std::fmt::Debug {
    /// Every index name on `source`, in the order the cluster returned them.
    async fn list(&self, source: &SourceUri, credentials: &Credentials) -> Result<Vec<String>>;
}

/// Split a `_cat/indices?h=index` body into index names.
///
/// One name per line; surrounding whitespace and blank lines are dropped.
pub fn parse_index_listing(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`IndexLister`] backed by the remote cluster's `_cat` API.
#[derive(Debug, Clone)]
pub struct HttpIndexLister {
    client: reqwest::Client,
}

impl HttpIndexLister {
    /// Create a lister with its own HTTP client.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a lister sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IndexLister for HttpIndexLister {
    async fn list(&self, source: &SourceUri, credentials: &Credentials) -> Result<Vec<String>> {
        let url = format!("{}{}", source.base_url(), CAT_INDICES_PATH);

        tracing::debug!(%url, "Listing remote indices");

        let response = self
            .client
            .get(&url)
            .basic_auth(credentials.username(), Some(credentials.password()))
            .send()
            .await
            .map_err(|e| ConnectivityError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "Remote index listing rejected");
            return Err(ConnectivityError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ConnectivityError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let indices = parse_index_listing(&body);
        tracing::info!(%url, count = indices.len(), "Listed remote indices");
        Ok(indices)
    }
}
