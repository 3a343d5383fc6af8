//! Run-level metrics.
//!
//! Plain atomics updated by the orchestrator and read through
//! [`MigrationMetrics::snapshot`]. Nothing here exports them; a host process
//! reads the snapshot and publishes it however it likes.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Counters for migration runs of one orchestrator.
#[derive(Debug, Default)]
pub struct MigrationMetrics {
    runs_started: AtomicU64,
    runs_finished: AtomicU64,
    runs_failed: AtomicU64,
    run_active: AtomicBool,
    indices_reindexed: AtomicU64,
    index_failures: AtomicU64,
    restart_wait_attempts: AtomicU64,
    restart_wait_exhausted: AtomicU64,
    allowlisted_hosts: AtomicI64,
    last_run_duration_ms: AtomicU64,
}

impl MigrationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run_start(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.run_active.store(true, Ordering::Relaxed);
    }

    pub fn record_run_finished(&self, duration: Duration) {
        self.runs_finished.fetch_add(1, Ordering::Relaxed);
        self.last_run_duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
        self.run_active.store(false, Ordering::Relaxed);
    }

    pub fn record_run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.run_active.store(false, Ordering::Relaxed);
    }

    /// Result of one index reindex. Cancelled indices are not recorded.
    pub fn record_index(&self, success: bool) {
        let counter = if success {
            &self.indices_reindexed
        } else {
            &self.index_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A restart wait that ended by polling, settled or exhausted.
    pub fn record_restart_wait(&self, attempts: u32, exhausted: bool) {
        self.restart_wait_attempts
            .fetch_add(u64::from(attempts), Ordering::Relaxed);
        if exhausted {
            self.restart_wait_exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of hosts this orchestrator currently keeps allowlisted.
    pub fn set_allowlisted_hosts(&self, count: usize) {
        self.allowlisted_hosts.store(count as i64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MigrationMetricsSnapshot {
        MigrationMetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_finished: self.runs_finished.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            run_active: self.run_active.load(Ordering::Relaxed),
            indices_reindexed: self.indices_reindexed.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
            restart_wait_attempts: self.restart_wait_attempts.load(Ordering::Relaxed),
            restart_wait_exhausted: self.restart_wait_exhausted.load(Ordering::Relaxed),
            allowlisted_hosts: self.allowlisted_hosts.load(Ordering::Relaxed),
            last_run_duration_ms: self.last_run_duration_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MigrationMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationMetricsSnapshot {
    pub runs_started: u64,
    pub runs_finished: u64,
    pub runs_failed: u64,
    pub run_active: bool,
    pub indices_reindexed: u64,
    pub index_failures: u64,
    pub restart_wait_attempts: u64,
    pub restart_wait_exhausted: u64,
    pub allowlisted_hosts: i64,
    pub last_run_duration_ms: u64,
}
