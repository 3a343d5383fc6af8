//! Named checks and transitions of the outer migration workflow.
//!
//! Every action is one entry in a table keyed by [`MigrationAction`]. An
//! entry is either a side-effect-free check, answered through
//! [`MigrationActions::check`], or a mutation run through
//! [`MigrationActions::apply`]. Mutations record their effect in a
//! [`MigrationStateStore`] and become no-ops once applied.

use super::state::{MigrationPath, MigrationState, MigrationStateStore};
use super::status::MigrationStatus;
use crate::certs::CertRenewalService;
use crate::error::{CheckError, Error, Result};
use crate::types::Credentials;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Whether an action only reads or also changes external systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Check,
    Mutation,
}

const BOTH_PATHS: &[MigrationPath] = &[MigrationPath::RollingUpgrade, MigrationPath::RemoteReindex];
const ROLLING_UPGRADE: &[MigrationPath] = &[MigrationPath::RollingUpgrade];
const REMOTE_REINDEX: &[MigrationPath] = &[MigrationPath::RemoteReindex];

/// Every step the workflow can ask about or perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationAction {
    ResetMigration,
    RunDirectoryCompatibilityCheck,
    IsOldClusterStopped,
    RollingUpgradeSelected,
    DirectoryCompatibilityCheckOk,
    ReindexUpgradeSelected,
    ReindexingFinished,
    ReindexOldData,
    StopMessageProcessing,
    StartMessageProcessing,
    CaDoesNotExist,
    RemovalPolicyDoesNotExist,
    CaAndRemovalPolicyExist,
    DataNodesProvisioned,
}

impl MigrationAction {
    pub const ALL: [MigrationAction; 14] = [
        MigrationAction::ResetMigration,
        MigrationAction::RunDirectoryCompatibilityCheck,
        MigrationAction::IsOldClusterStopped,
        MigrationAction::RollingUpgradeSelected,
        MigrationAction::DirectoryCompatibilityCheckOk,
        MigrationAction::ReindexUpgradeSelected,
        MigrationAction::ReindexingFinished,
        MigrationAction::ReindexOldData,
        MigrationAction::StopMessageProcessing,
        MigrationAction::StartMessageProcessing,
        MigrationAction::CaDoesNotExist,
        MigrationAction::RemovalPolicyDoesNotExist,
        MigrationAction::CaAndRemovalPolicyExist,
        MigrationAction::DataNodesProvisioned,
    ];

    /// Stable snake_case name, used in logs and check errors.
    pub fn name(&self) -> &'static str {
        match self {
            MigrationAction::ResetMigration => "reset_migration",
            MigrationAction::RunDirectoryCompatibilityCheck => "run_directory_compatibility_check",
            MigrationAction::IsOldClusterStopped => "is_old_cluster_stopped",
            MigrationAction::RollingUpgradeSelected => "rolling_upgrade_selected",
            MigrationAction::DirectoryCompatibilityCheckOk => "directory_compatibility_check_ok",
            MigrationAction::ReindexUpgradeSelected => "reindex_upgrade_selected",
            MigrationAction::ReindexingFinished => "reindexing_finished",
            MigrationAction::ReindexOldData => "reindex_old_data",
            MigrationAction::StopMessageProcessing => "stop_message_processing",
            MigrationAction::StartMessageProcessing => "start_message_processing",
            MigrationAction::CaDoesNotExist => "ca_does_not_exist",
            MigrationAction::RemovalPolicyDoesNotExist => "removal_policy_does_not_exist",
            MigrationAction::CaAndRemovalPolicyExist => "ca_and_removal_policy_exist",
            MigrationAction::DataNodesProvisioned => "data_nodes_provisioned",
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            MigrationAction::ResetMigration
            | MigrationAction::RollingUpgradeSelected
            | MigrationAction::ReindexUpgradeSelected
            | MigrationAction::ReindexOldData
            | MigrationAction::StopMessageProcessing
            | MigrationAction::StartMessageProcessing => ActionKind::Mutation,
            _ => ActionKind::Check,
        }
    }

    /// Paths this action is legal on.
    pub fn paths(&self) -> &'static [MigrationPath] {
        match self {
            MigrationAction::RunDirectoryCompatibilityCheck
            | MigrationAction::DirectoryCompatibilityCheckOk
            | MigrationAction::IsOldClusterStopped
            | MigrationAction::RollingUpgradeSelected => ROLLING_UPGRADE,
            MigrationAction::ReindexUpgradeSelected
            | MigrationAction::ReindexOldData
            | MigrationAction::ReindexingFinished => REMOTE_REINDEX,
            _ => BOTH_PATHS,
        }
    }

    /// Legal before a path is chosen, or on the chosen one.
    pub fn allowed_on(&self, path: Option<MigrationPath>) -> bool {
        path.map(|p| self.paths().contains(&p)).unwrap_or(true)
    }
}

impl std::fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Local preconditions consulted by the check actions.
///
/// `Ok(false)` means the condition does not hold yet; `Err` means it could
/// not be evaluated.
#[async_trait]
pub trait PreflightChecks: Send + Sync + std::fmt::Debug {
    async fn directory_compatible(&self) -> Result<bool>;
    async fn old_cluster_stopped(&self) -> Result<bool>;
    async fn ca_exists(&self) -> Result<bool>;
    async fn renewal_policy_exists(&self) -> Result<bool>;
}

/// Preflight answers fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticPreflight {
    pub directory_compatible: bool,
    pub old_cluster_stopped: bool,
    pub ca_exists: bool,
    pub renewal_policy_exists: bool,
}

impl Default for StaticPreflight {
    fn default() -> Self {
        Self {
            directory_compatible: true,
            old_cluster_stopped: true,
            ca_exists: true,
            renewal_policy_exists: true,
        }
    }
}

impl StaticPreflight {
    pub fn with_directory_compatible(mut self, value: bool) -> Self {
        self.directory_compatible = value;
        self
    }

    pub fn with_old_cluster_stopped(mut self, value: bool) -> Self {
        self.old_cluster_stopped = value;
        self
    }

    pub fn with_ca(mut self, exists: bool) -> Self {
        self.ca_exists = exists;
        self
    }

    pub fn with_renewal_policy(mut self, exists: bool) -> Self {
        self.renewal_policy_exists = exists;
        self
    }
}

#[async_trait]
impl PreflightChecks for StaticPreflight {
    async fn directory_compatible(&self) -> Result<bool> {
        Ok(self.directory_compatible)
    }

    async fn old_cluster_stopped(&self) -> Result<bool> {
        Ok(self.old_cluster_stopped)
    }

    async fn ca_exists(&self) -> Result<bool> {
        Ok(self.ca_exists)
    }

    async fn renewal_policy_exists(&self) -> Result<bool> {
        Ok(self.renewal_policy_exists)
    }
}

/// Switch for message ingestion around the data-moving window.
#[async_trait]
pub trait MessageProcessing: Send + Sync + std::fmt::Debug {
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
}

/// Process-local message processing flag.
#[derive(Debug)]
pub struct MessageProcessingSwitch {
    running: AtomicBool,
}

impl Default for MessageProcessingSwitch {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }
}

impl MessageProcessingSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MessageProcessing for MessageProcessingSwitch {
    async fn pause(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        tracing::info!("Paused message processing");
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        tracing::info!("Resumed message processing");
        Ok(())
    }
}

/// Source parameters for the remote reindex started by `ReindexOldData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexParams {
    pub uri: String,
    pub credentials: Credentials,
    /// Empty or `["*"]` for every index.
    pub indices: Vec<String>,
}

impl ReindexParams {
    pub fn new(uri: impl Into<String>, credentials: Credentials, indices: Vec<String>) -> Self {
        Self {
            uri: uri.into(),
            credentials,
            indices,
        }
    }
}

/// Starts remote reindex runs and reports their status.
#[async_trait]
pub trait ReindexTrigger: Send + Sync + std::fmt::Debug {
    /// Start a run without waiting for it.
    async fn trigger(&self, params: &ReindexParams) -> Result<Uuid>;

    /// Status of the most recent run.
    fn reindex_status(&self) -> MigrationStatus;
}

/// Decision table over the migration workflow's checks and mutations.
#[derive(Debug)]
pub struct MigrationActions {
    store: Arc<dyn MigrationStateStore>,
    preflight: Arc<dyn PreflightChecks>,
    certs: Arc<dyn CertRenewalService>,
    messages: Arc<dyn MessageProcessing>,
    reindex: Arc<dyn ReindexTrigger>,
    reindex_params: RwLock<Option<ReindexParams>>,
}

impl MigrationActions {
    pub fn new(
        store: Arc<dyn MigrationStateStore>,
        preflight: Arc<dyn PreflightChecks>,
        certs: Arc<dyn CertRenewalService>,
        messages: Arc<dyn MessageProcessing>,
        reindex: Arc<dyn ReindexTrigger>,
    ) -> Self {
        Self {
            store,
            preflight,
            certs,
            messages,
            reindex,
            reindex_params: RwLock::new(None),
        }
    }

    /// Source cluster used by `ReindexOldData`.
    pub fn set_reindex_source(&self, params: ReindexParams) {
        *self.reindex_params.write() = Some(params);
    }

    /// Current workflow state.
    pub async fn state(&self) -> Result<MigrationState> {
        Ok(self.store.load().await?.unwrap_or_default())
    }

    /// Selected path, if any.
    pub async fn path(&self) -> Result<Option<MigrationPath>> {
        Ok(self.state().await?.path)
    }

    /// Evaluate a check action.
    pub async fn check(&self, action: MigrationAction) -> Result<bool> {
        if action.kind() != ActionKind::Check {
            return Err(Error::Internal(format!("{} is not a check", action)));
        }
        self.ensure_allowed(action).await?;

        let result = match action {
            MigrationAction::RunDirectoryCompatibilityCheck
            | MigrationAction::DirectoryCompatibilityCheckOk => {
                self.preflight.directory_compatible().await
            }
            MigrationAction::IsOldClusterStopped => self.preflight.old_cluster_stopped().await,
            MigrationAction::ReindexingFinished => {
                Ok(self.reindex.reindex_status() == MigrationStatus::Finished)
            }
            MigrationAction::CaDoesNotExist => self.preflight.ca_exists().await.map(|e| !e),
            MigrationAction::RemovalPolicyDoesNotExist => {
                self.preflight.renewal_policy_exists().await.map(|e| !e)
            }
            MigrationAction::CaAndRemovalPolicyExist => match self.preflight.ca_exists().await {
                Ok(true) => self.preflight.renewal_policy_exists().await,
                other => other,
            },
            MigrationAction::DataNodesProvisioned => self.data_nodes_provisioned().await,
            _ => Err(Error::Internal(format!("{} has no check", action))),
        };

        let passed = result.map_err(|e| match e {
            Error::Check(check) => Error::Check(check),
            other => Error::Check(CheckError::Erroneous {
                check: action.name(),
                reason: other.to_string(),
            }),
        })?;

        tracing::debug!(%action, passed, "Evaluated migration check");
        Ok(passed)
    }

    /// Evaluate a check and turn a negative answer into a retryable error.
    pub async fn require(&self, action: MigrationAction) -> Result<()> {
        if self.check(action).await? {
            Ok(())
        } else {
            Err(CheckError::Failed {
                check: action.name(),
                reason: "condition does not hold".to_string(),
            }
            .into())
        }
    }

    /// Run a mutation action. Re-running an applied mutation does nothing.
    pub async fn apply(&self, action: MigrationAction) -> Result<()> {
        if action.kind() != ActionKind::Mutation {
            return Err(Error::Internal(format!("{} is not a mutation", action)));
        }

        if action == MigrationAction::ResetMigration {
            self.store.remove().await?;
            *self.reindex_params.write() = None;
            tracing::info!("Reset migration state");
            return Ok(());
        }

        self.ensure_allowed(action).await?;
        let mut state = self.state().await?;

        let changed = match action {
            MigrationAction::RollingUpgradeSelected => {
                select_path(&mut state, MigrationPath::RollingUpgrade)?
            }
            MigrationAction::ReindexUpgradeSelected => {
                select_path(&mut state, MigrationPath::RemoteReindex)?
            }
            MigrationAction::StopMessageProcessing => {
                if state.message_processing_paused {
                    false
                } else {
                    self.messages.pause().await?;
                    state.message_processing_paused = true;
                    true
                }
            }
            MigrationAction::StartMessageProcessing => {
                if !state.message_processing_paused {
                    false
                } else {
                    self.messages.resume().await?;
                    state.message_processing_paused = false;
                    true
                }
            }
            MigrationAction::ReindexOldData => {
                if state.reindex_started {
                    false
                } else {
                    let params = self.reindex_params.read().clone().ok_or_else(|| {
                        Error::Config("no reindex source configured".to_string())
                    })?;
                    let run_id = self.reindex.trigger(&params).await?;
                    tracing::info!(%run_id, "Triggered remote reindex");
                    state.reindex_started = true;
                    true
                }
            }
            _ => return Err(Error::Internal(format!("{} has no mutation", action))),
        };

        if changed {
            self.store.save(&state).await?;
            tracing::info!(%action, "Applied migration action");
        } else {
            tracing::debug!(%action, "Migration action already applied");
        }
        Ok(())
    }

    pub async fn reset_migration(&self) -> Result<()> {
        self.apply(MigrationAction::ResetMigration).await
    }

    pub async fn run_directory_compatibility_check(&self) -> Result<bool> {
        self.check(MigrationAction::RunDirectoryCompatibilityCheck).await
    }

    pub async fn is_old_cluster_stopped(&self) -> Result<bool> {
        self.check(MigrationAction::IsOldClusterStopped).await
    }

    pub async fn rolling_upgrade_selected(&self) -> Result<()> {
        self.apply(MigrationAction::RollingUpgradeSelected).await
    }

    pub async fn directory_compatibility_check_ok(&self) -> Result<bool> {
        self.check(MigrationAction::DirectoryCompatibilityCheckOk).await
    }

    pub async fn reindex_upgrade_selected(&self) -> Result<()> {
        self.apply(MigrationAction::ReindexUpgradeSelected).await
    }

    pub async fn reindexing_finished(&self) -> Result<bool> {
        self.check(MigrationAction::ReindexingFinished).await
    }

    pub async fn reindex_old_data(&self) -> Result<()> {
        self.apply(MigrationAction::ReindexOldData).await
    }

    pub async fn stop_message_processing(&self) -> Result<()> {
        self.apply(MigrationAction::StopMessageProcessing).await
    }

    pub async fn start_message_processing(&self) -> Result<()> {
        self.apply(MigrationAction::StartMessageProcessing).await
    }

    pub async fn ca_does_not_exist(&self) -> Result<bool> {
        self.check(MigrationAction::CaDoesNotExist).await
    }

    pub async fn removal_policy_does_not_exist(&self) -> Result<bool> {
        self.check(MigrationAction::RemovalPolicyDoesNotExist).await
    }

    pub async fn ca_and_removal_policy_exist(&self) -> Result<bool> {
        self.check(MigrationAction::CaAndRemovalPolicyExist).await
    }

    pub async fn data_nodes_provisioned_check(&self) -> Result<bool> {
        self.check(MigrationAction::DataNodesProvisioned).await
    }

    async fn data_nodes_provisioned(&self) -> Result<bool> {
        let nodes = self.certs.find_nodes().await?;
        let now = Utc::now();
        let pending: Vec<&str> = nodes
            .iter()
            .filter(|n| !n.is_provisioned(now))
            .map(|n| n.node_id.as_str())
            .collect();
        if !pending.is_empty() {
            tracing::debug!(?pending, "Data nodes without a valid certificate");
        }
        Ok(!nodes.is_empty() && pending.is_empty())
    }

    async fn ensure_allowed(&self, action: MigrationAction) -> Result<()> {
        let path = self.path().await?;
        if action.allowed_on(path) {
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "{} is not valid on the {} path",
                action,
                path.map(|p| p.to_string()).unwrap_or_default()
            )))
        }
    }
}

/// Record `path`, rejecting a switch once one was chosen.
fn select_path(state: &mut MigrationState, path: MigrationPath) -> Result<bool> {
    match state.path {
        Some(current) if current == path => Ok(false),
        Some(current) => Err(Error::Internal(format!(
            "migration path already set to {}, cannot select {}",
            current, path
        ))),
        None => {
            state.path = Some(path);
            Ok(true)
        }
    }
}
