//! Consumer-side view of the allowlist.

use super::events::{AllowlistAction, AllowlistEvent, AllowlistListener};
use crate::types::HostPort;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// The effective allowlist: every ADDed host minus every REMOVEd one.
///
/// Repeated events for the same host are idempotent.
#[derive(Debug, Default)]
pub struct AllowlistState {
    hosts: RwLock<BTreeSet<HostPort>>,
}

impl AllowlistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state. Returns `true` if the state changed.
    pub fn apply(&self, event: &AllowlistEvent) -> bool {
        let mut hosts = self.hosts.write();
        match event.action {
            AllowlistAction::Add => hosts.insert(event.host.clone()),
            AllowlistAction::Remove => hosts.remove(&event.host),
        }
    }

    /// Whether `host` is currently allowed.
    pub fn contains(&self, host: &HostPort) -> bool {
        self.hosts.read().contains(host)
    }

    /// Allowed hosts in sorted order.
    pub fn hosts(&self) -> Vec<HostPort> {
        self.hosts.read().iter().cloned().collect()
    }

    /// Number of allowed hosts.
    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    /// Whether no host is allowed.
    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }
}

impl AllowlistListener for AllowlistState {
    fn on_event(&self, event: &AllowlistEvent) {
        if !self.apply(event) {
            tracing::debug!(host = %event.host, action = %event.action, "Allowlist event had no effect");
        }
    }
}
