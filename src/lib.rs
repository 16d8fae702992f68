//! Warden - a per-node sidecar for a consistent-hash-sharded cache proxy.
//!
//! Warden manages the lifecycle of a Redis-compatible, consistent-hash
//! sharded cache-proxy process and its backing storage engine across a
//! multi-rack, multi-region fleet. It gives every node a durable, race-free
//! position ("token") on the cluster's hash ring, safely re-warms a node's
//! data when it joins or replaces a dead peer, and continuously supervises
//! the local proxy and storage processes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Warden                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Startup: Identity Manager ── Token Manager ── Advisory Lock │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Bootstrap: Peer-Sync Engine ── cutover sequence             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Steady state: Supervision Loop ── Health Board              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Collaborators: Topology Store | Membership | Processes      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no central coordinator: membership changes are serialized per
//! slot with a best-effort advisory lock over the (eventually consistent)
//! topology store, and every algorithm tolerates stale reads.
//!
//! # Quick Start
//!
//! ```no_run
//! use warden::config::WardenConfig;
//!
//! #[tokio::main]
//! async fn main() -> warden::Result<()> {
//!     let config = WardenConfig::development();
//!     warden::run(config).await
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;
pub mod identity;
pub mod lock;
pub mod membership;
pub mod process;
pub mod registry;
pub mod retry;
pub mod sidecar;
pub mod sim;
pub mod supervision;
pub mod token;
pub mod types;

pub use error::{Result, WardenError};
pub use health::{HealthBoard, HealthSnapshot};
pub use sidecar::{shutdown_channel, Collaborators, Sidecar};
pub use types::{BootstrapOutcome, NodeRecord};

use crate::config::WardenConfig;
use crate::lock::TtlRowLock;
use crate::membership::StaticMembership;
use crate::registry::MemoryTopologyStore;
use std::sync::Arc;
use tracing::info;

/// Run a development-mode sidecar: in-memory registry, static membership,
/// and simulated processes, all in one process. Production deployments build
/// [`Collaborators`] from real bindings and drive [`Sidecar`] directly.
pub async fn run(config: WardenConfig) -> Result<()> {
    config.validate()?;

    let store = Arc::new(MemoryTopologyStore::new());
    let collaborators = Collaborators {
        store: store.clone(),
        lock: Arc::new(TtlRowLock::new(store, config.lock.clone())),
        membership: Arc::new(StaticMembership::new(vec![config.node.instance_id.clone()])),
        storage: Arc::new(sim::SimStorageEngine::new()),
        peers: Arc::new(sim::SimPeerConnector::new()),
        proxy: Arc::new(sim::RecordingProxyAdmin::new()),
        controller: Arc::new(sim::SimProcessController::new()),
    };

    let sidecar = Sidecar::new(config, collaborators);
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt; shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    sidecar.run(shutdown_rx).await
}
