//! Sidecar orchestration.
//!
//! Wires the coordination pieces into the node lifecycle: identity
//! resolution blocks startup (a node without a token must not serve), a
//! warm bootstrap runs once per bootstrap event (new node, replacement, or
//! consumed placeholder), and the supervision loop then runs until shutdown.

use crate::bootstrap::PeerSyncEngine;
use crate::config::WardenConfig;
use crate::error::Result;
use crate::health::HealthBoard;
use crate::identity::IdentityManager;
use crate::lock::DistributedLock;
use crate::membership::MembershipSource;
use crate::process::{PeerConnector, ProcessController, ProxyAdmin, StorageEngine};
use crate::registry::TopologyStore;
use crate::supervision::SupervisionLoop;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// External collaborators the sidecar coordinates.
pub struct Collaborators {
    pub store: Arc<dyn TopologyStore>,
    pub lock: Arc<dyn DistributedLock>,
    pub membership: Arc<dyn MembershipSource>,
    pub storage: Arc<dyn StorageEngine>,
    pub peers: Arc<dyn PeerConnector>,
    pub proxy: Arc<dyn ProxyAdmin>,
    pub controller: Arc<dyn ProcessController>,
}

/// The per-node sidecar.
pub struct Sidecar {
    config: WardenConfig,
    collaborators: Collaborators,
    health: HealthBoard,
}

impl Sidecar {
    pub fn new(config: WardenConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            health: HealthBoard::new(),
        }
    }

    /// Handle to the shared health board, for external health endpoints.
    pub fn health(&self) -> HealthBoard {
        self.health.clone()
    }

    /// Run the sidecar until `shutdown` flips to true.
    ///
    /// Identity resolution failures are fatal and propagate; bootstrap
    /// outcomes degrade gracefully inside the peer-sync engine.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let identity_manager = IdentityManager::new(
            self.config.clone(),
            Arc::clone(&self.collaborators.store),
            Arc::clone(&self.collaborators.lock),
            Arc::clone(&self.collaborators.membership),
        );

        let identity = identity_manager.resolve().await?;

        if identity.record.out_of_service {
            warn!(record = %identity.record, "Node is decommissioned; not serving");
            return Ok(());
        }

        info!(
            record = %identity.record,
            is_replace = identity.is_replace,
            is_token_pregenerated = identity.is_token_pregenerated,
            is_new_token = identity.is_new_token,
            "Identity resolved"
        );

        // A bootstrap event is anything other than an idempotent restart.
        if identity.is_replace || identity.is_token_pregenerated || identity.is_new_token {
            let engine = PeerSyncEngine::new(
                self.config.clone(),
                Arc::clone(&self.collaborators.store),
                Arc::clone(&self.collaborators.storage),
                Arc::clone(&self.collaborators.peers),
                Arc::clone(&self.collaborators.proxy),
                Arc::clone(&self.collaborators.controller),
                self.health.clone(),
            );
            let outcome = engine.warm_bootstrap(&identity).await?;
            info!(outcome = %outcome, "Warm bootstrap finished");
        }

        let supervision = SupervisionLoop::new(
            self.config.clone(),
            Arc::clone(&self.collaborators.controller),
            Arc::clone(&self.collaborators.proxy),
            Arc::clone(&self.collaborators.storage),
            self.health.clone(),
        );
        supervision.run(shutdown).await;
        Ok(())
    }
}

/// Create the shutdown channel pair used by [`Sidecar::run`].
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
