//! Active node registry and membership snapshots.
//!
//! The orchestrator detects a finished cluster restart by comparing two
//! [`NodeSnapshot`]s: one captured before the restart and one captured on
//! each poll afterwards. The comparison is set containment, so a topology
//! that gained nodes during the restart still counts as back.

use crate::error::Result;
use crate::types::NodeId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Immutable set of node identifiers captured at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    nodes: BTreeSet<NodeId>,
}

impl NodeSnapshot {
    /// Build a snapshot from any collection of identifiers.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether every member of `other` is also in this snapshot.
    pub fn contains_all(&self, other: &NodeSnapshot) -> bool {
        other.nodes.is_subset(&self.nodes)
    }

    /// Members of `other` missing from this snapshot.
    pub fn missing_from(&self, other: &NodeSnapshot) -> Vec<NodeId> {
        other.nodes.difference(&self.nodes).cloned().collect()
    }

    /// Whether a node is part of the snapshot.
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    /// Iterate node identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Source of the current cluster membership.
#[async_trait]
pub trait NodeRegistry: Send + Sync + std::fmt::Debug {
    /// Identifiers of every node currently considered active.
    async fn active_nodes(&self) -> Result<NodeSnapshot>;
}

/// Process-local membership list.
///
/// Membership is whatever was last registered; there is no failure
/// detection here, callers remove nodes they no longer consider active.
#[derive(Debug, Default)]
pub struct InMemoryNodeRegistry {
    nodes: RwLock<BTreeSet<NodeId>>,
}

impl InMemoryNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that starts with `nodes` active.
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            nodes: RwLock::new(nodes.into_iter().map(Into::into).collect()),
        }
    }

    /// Mark a node active. Returns `false` if it already was.
    pub fn register(&self, node_id: impl Into<NodeId>) -> bool {
        let node_id = node_id.into();
        let added = self.nodes.write().insert(node_id.clone());
        if added {
            tracing::debug!(%node_id, "Node joined");
        }
        added
    }

    /// Drop a node from the active set. Returns `false` if it was not there.
    pub fn remove(&self, node_id: &str) -> bool {
        let removed = self.nodes.write().remove(node_id);
        if removed {
            tracing::debug!(%node_id, "Node left");
        }
        removed
    }
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn active_nodes(&self) -> Result<NodeSnapshot> {
        Ok(NodeSnapshot {
            nodes: self.nodes.read().clone(),
        })
    }
}
