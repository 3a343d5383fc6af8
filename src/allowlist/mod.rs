//! Temporary authorization of remote reindex sources.
//!
//! The orchestrator receives an [`AllowlistGate`] capability and calls
//! `allow`/`revoke` on it. [`EventBusAllowlist`] turns those calls into
//! [`AllowlistEvent`]s delivered to registered listeners and to an unbounded
//! channel, so the security layer stays decoupled from the orchestrator.
//! Posting never waits for an acknowledgement.

pub mod events;
pub mod state;

pub use events::{AllowlistAction, AllowlistEvent, AllowlistListener};
pub use state::AllowlistState;

use crate::error::Result;
use crate::types::HostPort;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capability to open and close the security gate for a remote host.
pub trait AllowlistGate: Send + Sync + std::fmt::Debug {
    /// Allow `host` as a reindex source. Repeated calls are idempotent.
    fn allow(&self, host: &HostPort) -> Result<()>;

    /// Stop allowing `host` as a reindex source.
    fn revoke(&self, host: &HostPort) -> Result<()>;
}

/// Gate that publishes allowlist events to in-process subscribers.
pub struct EventBusAllowlist {
    listeners: RwLock<Vec<Arc<dyn AllowlistListener>>>,
    event_tx: mpsc::UnboundedSender<AllowlistEvent>,
    allowed: RwLock<BTreeSet<HostPort>>,
}

impl std::fmt::Debug for EventBusAllowlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusAllowlist")
            .field("listeners", &self.listeners.read().len())
            .field("allowed", &*self.allowed.read())
            .finish()
    }
}

impl EventBusAllowlist {
    /// Create a gate and the receiving end of its event channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<AllowlistEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Self {
            listeners: RwLock::new(Vec::new()),
            event_tx,
            allowed: RwLock::new(BTreeSet::new()),
        });
        (gate, event_rx)
    }

    /// Add an event listener.
    pub fn add_listener(&self, listener: Arc<dyn AllowlistListener>) {
        self.listeners.write().push(listener);
    }

    /// Hosts this gate has allowed and not revoked.
    pub fn allowed_hosts(&self) -> Vec<HostPort> {
        self.allowed.read().iter().cloned().collect()
    }

    fn post(&self, event: AllowlistEvent) {
        // Receiver may be gone; listeners still get the event.
        let _ = self.event_tx.send(event.clone());

        for listener in self.listeners.read().iter() {
            listener.on_event(&event);
        }
    }
}

impl AllowlistGate for EventBusAllowlist {
    fn allow(&self, host: &HostPort) -> Result<()> {
        self.allowed.write().insert(host.clone());
        tracing::info!(%host, "Allowing remote reindex source");
        self.post(AllowlistEvent::add(host.clone()));
        Ok(())
    }

    fn revoke(&self, host: &HostPort) -> Result<()> {
        self.allowed.write().remove(host);
        tracing::info!(%host, "Revoking remote reindex source");
        self.post(AllowlistEvent::remove(host.clone()));
        Ok(())
    }
}
