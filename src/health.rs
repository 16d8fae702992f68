//! Shared node health state.
//!
//! Health is published as an immutable snapshot swapped behind a cheap read
//! path. Every write copies the current snapshot under the write lock,
//! modifies only the fields its writer owns, and swaps the shared `Arc`:
//! the supervision loop owns the four probe fields (via
//! [`HealthBoard::publish_probes`]), the peer-sync engine owns
//! `bootstrapping`, and operator tooling owns `monitoring_suspended`.
//! Because no writer touches fields it does not own, a flag set while a
//! supervision tick is in flight survives that tick's publish. Readers clone
//! the `Arc` and must treat what they see as an eventually consistent
//! snapshot, never as fresh.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Point-in-time view of node health. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Storage process exists at the OS level.
    pub storage_process_alive: bool,
    /// Proxy process exists at the OS level.
    pub proxy_process_alive: bool,
    /// Proxy answered a protocol ping.
    pub proxy_responsive: bool,
    /// Storage answered a protocol ping.
    pub storage_responsive: bool,
    /// Warm bootstrap in progress.
    pub bootstrapping: bool,
    /// Backup in progress.
    pub backing_up: bool,
    /// Restore in progress.
    pub restoring: bool,
    /// Supervision ticks are skipped entirely while set.
    pub monitoring_suspended: bool,
    /// When this snapshot was published.
    pub updated_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Derived overall health, consumed by the external health-check
    /// endpoint.
    pub fn healthy(&self) -> bool {
        self.proxy_responsive && self.storage_responsive
    }
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            storage_process_alive: false,
            proxy_process_alive: false,
            proxy_responsive: false,
            storage_responsive: false,
            bootstrapping: false,
            backing_up: false,
            restoring: false,
            monitoring_suspended: false,
            updated_at: Utc::now(),
        }
    }
}

/// Probe results of one supervision pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeReport {
    pub storage_process_alive: bool,
    pub proxy_process_alive: bool,
    pub proxy_responsive: bool,
    pub storage_responsive: bool,
}

/// Shared handle over the current health snapshot.
///
/// Cloning the board is cheap; all clones observe the same snapshot.
#[derive(Clone, Default)]
pub struct HealthBoard {
    current: Arc<RwLock<Arc<HealthSnapshot>>>,
}

impl HealthBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current snapshot.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Publish the probe fields of one supervision pass. Lifecycle flags set
    /// concurrently through the flag setters are preserved. Supervision loop
    /// only.
    pub fn publish_probes(&self, probes: ProbeReport) {
        self.update(|s| {
            s.storage_process_alive = probes.storage_process_alive;
            s.proxy_process_alive = probes.proxy_process_alive;
            s.proxy_responsive = probes.proxy_responsive;
            s.storage_responsive = probes.storage_responsive;
        });
    }

    /// Copy-modify-swap the current snapshot.
    fn update<F: FnOnce(&mut HealthSnapshot)>(&self, f: F) {
        let mut guard = self.current.write();
        let mut next = (**guard).clone();
        f(&mut next);
        next.updated_at = Utc::now();
        *guard = Arc::new(next);
    }

    /// Flag a warm bootstrap as in progress / finished.
    pub fn set_bootstrapping(&self, value: bool) {
        self.update(|s| s.bootstrapping = value);
    }

    /// Flag a backup as in progress / finished.
    pub fn set_backing_up(&self, value: bool) {
        self.update(|s| s.backing_up = value);
    }

    /// Flag a restore as in progress / finished.
    pub fn set_restoring(&self, value: bool) {
        self.update(|s| s.restoring = value);
    }

    /// Suspend or resume supervision ticks.
    pub fn set_monitoring_suspended(&self, value: bool) {
        self.update(|s| s.monitoring_suspended = value);
    }
}
