//! Allowlist change events.

use crate::types::HostPort;
use serde::{Deserialize, Serialize};

/// Change applied to the set of allowed reindex sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowlistAction {
    Add,
    Remove,
}

impl std::fmt::Display for AllowlistAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllowlistAction::Add => write!(f, "ADD"),
            AllowlistAction::Remove => write!(f, "REMOVE"),
        }
    }
}

/// A single allowlist mutation as seen by the security layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEvent {
    /// `host:port` of the remote cluster.
    pub host: HostPort,
    /// Whether the host is being added or removed.
    pub action: AllowlistAction,
}

impl AllowlistEvent {
    /// An ADD event for `host`.
    pub fn add(host: HostPort) -> Self {
        Self {
            host,
            action: AllowlistAction::Add,
        }
    }

    /// A REMOVE event for `host`.
    pub fn remove(host: HostPort) -> Self {
        Self {
            host,
            action: AllowlistAction::Remove,
        }
    }
}

/// Consumer of allowlist events.
pub trait AllowlistListener: Send + Sync + 'static {
    /// Called for every posted event. Must not block.
    fn on_event(&self, event: &AllowlistEvent);
}
