//! Warm bootstrap: peer-sync convergence before serving.
//!
//! A node that joins with a token but no data replicates from the cross-rack
//! owner of the same hash range before it is allowed to serve. The engine
//! picks the reachable same-token peer with the greatest uptime (long uptime
//! is the heuristic for "not itself mid-sync, holds the most complete data"),
//! enters replica mode against it, and polls replication offsets until the
//! gap converges, grows persistently, or the time budget runs out.
//!
//! Outcome handling is deliberately permissive: `RetriesExhausted` and
//! `BootstrapTimeExpired` still proceed through the traffic cutover with
//! whatever data arrived, and the two hard failures (`CannotConnect`,
//! `WarmupError`) promote the node to an empty standalone master rather than
//! block forever.

use crate::config::WardenConfig;
use crate::error::Result;
use crate::health::HealthBoard;
use crate::identity::NodeIdentity;
use crate::process::{PeerConnector, ProcessController, ProxyAdmin, StorageEngine, StoragePeer};
use crate::registry::TopologyStore;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::types::{BootstrapOutcome, NodeRecord, TrafficState};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Drives one warm-bootstrap attempt.
pub struct PeerSyncEngine {
    config: WardenConfig,
    store: Arc<dyn TopologyStore>,
    storage: Arc<dyn StorageEngine>,
    peers: Arc<dyn PeerConnector>,
    proxy: Arc<dyn ProxyAdmin>,
    controller: Arc<dyn ProcessController>,
    health: HealthBoard,
}

impl PeerSyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WardenConfig,
        store: Arc<dyn TopologyStore>,
        storage: Arc<dyn StorageEngine>,
        peers: Arc<dyn PeerConnector>,
        proxy: Arc<dyn ProxyAdmin>,
        controller: Arc<dyn ProcessController>,
        health: HealthBoard,
    ) -> Self {
        Self {
            config,
            store,
            storage,
            peers,
            proxy,
            controller,
            health,
        }
    }

    /// Run the full warm bootstrap: sync, then either the cutover sequence
    /// or promotion to an empty master. Always clears the `bootstrapping`
    /// flag on the way out.
    pub async fn warm_bootstrap(&self, identity: &NodeIdentity) -> Result<BootstrapOutcome> {
        self.health.set_bootstrapping(true);
        let outcome = self.sync_from_peer(identity).await;
        let result = match outcome {
            Ok(outcome) => {
                self.finish(outcome).await?;
                Ok(outcome)
            }
            Err(e) => Err(e),
        };
        self.health.set_bootstrapping(false);
        result
    }

    /// The convergence algorithm itself, without the cutover tail.
    pub async fn sync_from_peer(&self, identity: &NodeIdentity) -> Result<BootstrapOutcome> {
        let Some((record, peer)) = self.select_peer(identity).await? else {
            warn!(token = %identity.record.token, "No reachable sync peer for this token");
            return Ok(BootstrapOutcome::CannotConnect);
        };
        info!(peer = %record.hostname, token = %identity.record.token, "Starting replica-mode sync");

        if let Err(e) = self
            .storage
            .start_replica_of(&record.hostname, self.config.node.storage_port)
            .await
        {
            error!(peer = %record.hostname, error = %e, "Failed to enter replica mode");
            return Ok(BootstrapOutcome::WarmupError);
        }

        let cfg = &self.config.bootstrap;
        let mut started = Instant::now();
        let mut prev_diff: Option<u64> = None;
        let mut growth_samples = 0u32;
        let mut poll_errors = 0u32;

        loop {
            sleep(cfg.poll_interval).await;

            let offsets = async {
                let master = peer.master_replication_offset().await?;
                let slave = self.storage.slave_replication_offset().await?;
                Ok::<_, crate::error::WardenError>((master, slave))
            }
            .await;

            let (master, slave) = match offsets {
                Ok(pair) => {
                    poll_errors = 0;
                    pair
                }
                Err(e) => {
                    poll_errors += 1;
                    warn!(error = %e, consecutive = poll_errors, "Offset poll failed");
                    if poll_errors >= cfg.max_poll_errors {
                        return Ok(BootstrapOutcome::WarmupError);
                    }
                    continue;
                }
            };

            if slave == 0 {
                // Initial sync has not started moving yet; this counts as
                // "still starting", not as elapsed bootstrap time.
                started = Instant::now();
                prev_diff = None;
                continue;
            }

            let diff = master.abs_diff(slave);
            tracing::debug!(master, slave, diff, "Replication offsets sampled");

            if diff < cfg.convergence_threshold_bytes {
                info!(diff, threshold = cfg.convergence_threshold_bytes, "Replication converged");
                return Ok(BootstrapOutcome::InSyncSuccess);
            }

            match prev_diff {
                Some(prev) if diff > prev => {
                    growth_samples += 1;
                    if growth_samples >= cfg.max_growth_samples {
                        warn!(samples = growth_samples, "Offset gap keeps growing; giving up");
                        return Ok(BootstrapOutcome::RetriesExhausted);
                    }
                }
                _ => growth_samples = 0,
            }
            prev_diff = Some(diff);

            if started.elapsed() > cfg.max_duration {
                warn!(elapsed_secs = started.elapsed().as_secs(), "Bootstrap time budget expired");
                return Ok(BootstrapOutcome::BootstrapTimeExpired);
            }
        }
    }

    /// Candidate peers are the live records in this datacenter sharing this
    /// node's token but sitting in a different rack. Among the reachable
    /// ones, the greatest uptime wins; ties keep the first found.
    async fn select_peer(
        &self,
        identity: &NodeIdentity,
    ) -> Result<Option<(NodeRecord, Box<dyn StoragePeer>)>> {
        let retry = RetryExecutor::new("list-sync-candidates", RetryConfig::quick());
        let records = retry
            .execute(|| {
                self.store
                    .list_records_in_region(&self.config.cluster.name, &self.config.cluster.datacenter)
            })
            .await?;

        let mut best: Option<(NodeRecord, Box<dyn StoragePeer>, u64)> = None;
        for record in records {
            if record.token != identity.record.token
                || record.rack == self.config.cluster.rack
                || record.is_placeholder()
                || record.out_of_service
            {
                continue;
            }

            let peer = match self
                .peers
                .connect(&record.hostname, self.config.node.storage_port)
                .await
            {
                Ok(peer) => peer,
                Err(e) => {
                    warn!(peer = %record.hostname, error = %e, "Sync candidate unreachable");
                    continue;
                }
            };
            if !peer.ping().await {
                warn!(peer = %record.hostname, "Sync candidate not answering pings");
                continue;
            }
            let uptime = match peer.uptime_seconds().await {
                Ok(uptime) => uptime,
                Err(e) => {
                    warn!(peer = %record.hostname, error = %e, "Failed to read candidate uptime");
                    continue;
                }
            };

            match &best {
                Some((_, _, best_uptime)) if uptime <= *best_uptime => {}
                _ => best = Some((record, peer, uptime)),
            }
        }

        Ok(best.map(|(record, peer, _)| (record, peer)))
    }

    /// Post-sync tail: the cutover sequence on "good enough" outcomes, a
    /// plain promotion on hard failures.
    async fn finish(&self, outcome: BootstrapOutcome) -> Result<()> {
        if outcome.allows_cutover() {
            self.controller.start_proxy().await?;

            if !self.wait_for_proxy().await {
                // No auto-retry at this layer; the node stays in
                // bootstrapping-failed state for operators to inspect.
                error!(outcome = %outcome, "Proxy never became responsive after sync");
                return Ok(());
            }

            // Ordered cutover: take writes first so nothing in flight is
            // dropped, then hand replication off, then open fully.
            self.proxy.set_traffic_state(TrafficState::WritesOnly).await?;
            self.storage.promote_to_master().await?;
            self.proxy.set_traffic_state(TrafficState::Resuming).await?;
            sleep(self.config.bootstrap.drain_interval).await;
            self.proxy.set_traffic_state(TrafficState::Normal).await?;
            info!(outcome = %outcome, "Traffic cutover complete");
        } else {
            // Serve as an empty master rather than block forever.
            self.storage.promote_to_master().await?;
            warn!(outcome = %outcome, "Promoted to standalone master without cutover");
        }
        Ok(())
    }

    async fn wait_for_proxy(&self) -> bool {
        for attempt in 1..=self.config.bootstrap.proxy_ping_attempts {
            if self.proxy.ping().await {
                return true;
            }
            tracing::debug!(attempt, "Proxy not yet responsive");
            sleep(self.config.bootstrap.poll_interval.min(std::time::Duration::from_secs(1))).await;
        }
        false
    }
}
