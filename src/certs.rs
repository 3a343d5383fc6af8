//! Per-node certificate provisioning as seen by the migration.
//!
//! Issuing certificates happens elsewhere. The migration only needs to know
//! whether every data node holds a valid certificate, and to ask for a
//! renewal when one is about to expire.

use crate::error::{Error, Result};
use crate::types::NodeId;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Provisioning progress of one data node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    Unconfigured,
    Configured,
    /// Signing request created, waiting for the CA.
    Csr,
    Signed,
    StartupPrepared,
    StartupTrigger,
    Connecting,
    Connected,
    Error,
}

impl ProvisioningState {
    /// Whether the node has received a signed certificate.
    pub fn has_certificate(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Signed
                | ProvisioningState::StartupPrepared
                | ProvisioningState::StartupTrigger
                | ProvisioningState::Connecting
                | ProvisioningState::Connected
        )
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisioningState::Unconfigured => "UNCONFIGURED",
            ProvisioningState::Configured => "CONFIGURED",
            ProvisioningState::Csr => "CSR",
            ProvisioningState::Signed => "SIGNED",
            ProvisioningState::StartupPrepared => "STARTUP_PREPARED",
            ProvisioningState::StartupTrigger => "STARTUP_TRIGGER",
            ProvisioningState::Connecting => "CONNECTING",
            ProvisioningState::Connected => "CONNECTED",
            ProvisioningState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Certificate status of one data node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNodeCertInfo {
    pub node_id: NodeId,
    pub hostname: String,
    pub transport_address: String,
    pub provisioning: ProvisioningState,
    pub error_msg: Option<String>,
    pub cert_valid_until: Option<DateTime<Utc>>,
}

impl DataNodeCertInfo {
    pub fn new(
        node_id: impl Into<NodeId>,
        hostname: impl Into<String>,
        transport_address: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: hostname.into(),
            transport_address: transport_address.into(),
            provisioning: ProvisioningState::Unconfigured,
            error_msg: None,
            cert_valid_until: None,
        }
    }

    pub fn with_certificate(mut self, state: ProvisioningState, valid_until: DateTime<Utc>) -> Self {
        self.provisioning = state;
        self.cert_valid_until = Some(valid_until);
        self
    }

    /// Holds a certificate that is still valid at `now`.
    pub fn is_provisioned(&self, now: DateTime<Utc>) -> bool {
        self.provisioning.has_certificate()
            && self.cert_valid_until.map(|until| until > now).unwrap_or(false)
    }

    /// Holds a certificate that expires before `now + window`.
    pub fn needs_renewal(&self, now: DateTime<Utc>, window: ChronoDuration) -> bool {
        self.provisioning.has_certificate()
            && self
                .cert_valid_until
                .map(|until| until <= now + window)
                .unwrap_or(false)
    }
}

/// Supplies and renews data node certificates.
#[async_trait]
pub trait CertRenewalService: Send + Sync + std::fmt::Debug {
    /// Every known data node with its certificate status.
    async fn find_nodes(&self) -> Result<Vec<DataNodeCertInfo>>;

    /// Ask for a fresh certificate for `node_id`.
    async fn initiate_renewal_for_node(&self, node_id: &str) -> Result<()>;

    /// Start a renewal for every node whose certificate is about to expire.
    /// Returns the nodes a renewal was started for.
    async fn check_certificates_for_renewal(&self) -> Result<Vec<NodeId>>;
}

/// In-memory node list with a fixed renewal window.
#[derive(Debug)]
pub struct InMemoryCertRenewalService {
    nodes: RwLock<Vec<DataNodeCertInfo>>,
    renewal_window: ChronoDuration,
}

impl Default for InMemoryCertRenewalService {
    fn default() -> Self {
        Self::new(ChronoDuration::days(7))
    }
}

impl InMemoryCertRenewalService {
    pub fn new(renewal_window: ChronoDuration) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            renewal_window,
        }
    }

    /// Add or replace a node.
    pub fn upsert(&self, info: DataNodeCertInfo) {
        let mut nodes = self.nodes.write();
        match nodes.iter_mut().find(|n| n.node_id == info.node_id) {
            Some(existing) => *existing = info,
            None => nodes.push(info),
        }
    }
}

#[async_trait]
impl CertRenewalService for InMemoryCertRenewalService {
    async fn find_nodes(&self) -> Result<Vec<DataNodeCertInfo>> {
        Ok(self.nodes.read().clone())
    }

    async fn initiate_renewal_for_node(&self, node_id: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .iter_mut()
            .find(|n| n.node_id == node_id)
            .ok_or_else(|| Error::Internal(format!("unknown data node {}", node_id)))?;

        node.provisioning = ProvisioningState::Configured;
        node.error_msg = None;
        tracing::info!(node_id = %node_id, hostname = %node.hostname, "Initiated certificate renewal");
        Ok(())
    }

    async fn check_certificates_for_renewal(&self) -> Result<Vec<NodeId>> {
        let now = Utc::now();
        let due: Vec<NodeId> = self
            .nodes
            .read()
            .iter()
            .filter(|n| n.needs_renewal(now, self.renewal_window))
            .map(|n| n.node_id.clone())
            .collect();

        for node_id in &due {
            self.initiate_renewal_for_node(node_id).await?;
        }
        Ok(due)
    }
}
