//! Process supervision loop.
//!
//! A fixed-interval, single-writer state machine over the local processes.
//! Each tick probes OS-level proxy liveness, protocol-pings the proxy and the
//! storage engine, and publishes the probe results to the health board
//! without touching the lifecycle flags owned by other writers. The only
//! automatic remediation is starting a proxy process that is not running at
//! the OS level. An unresponsive storage engine is surfaced as fatal and left
//! for manual intervention: restarting it automatically could mask data
//! loss. A hung-but-existing process is likewise surfaced, not healed.

use crate::config::WardenConfig;
use crate::health::{HealthBoard, ProbeReport};
use crate::process::{ProcessController, ProxyAdmin, StorageEngine};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Periodic supervisor of the proxy and storage processes. Sole writer of
/// the health board's probe fields.
pub struct SupervisionLoop {
    config: WardenConfig,
    controller: Arc<dyn ProcessController>,
    proxy: Arc<dyn ProxyAdmin>,
    storage: Arc<dyn StorageEngine>,
    health: HealthBoard,
}

impl SupervisionLoop {
    pub fn new(
        config: WardenConfig,
        controller: Arc<dyn ProcessController>,
        proxy: Arc<dyn ProxyAdmin>,
        storage: Arc<dyn StorageEngine>,
        health: HealthBoard,
    ) -> Self {
        Self {
            config,
            controller,
            proxy,
            storage,
            health,
        }
    }

    /// Run ticks until the shutdown signal flips. Ticks never overlap: each
    /// runs to completion before the next is scheduled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.supervision.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Supervision loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One supervision pass. Never propagates errors; a bad tick must not
    /// kill the loop.
    pub async fn tick(&self) {
        if self.health.snapshot().monitoring_suspended {
            debug!("Monitoring suspended; skipping tick");
            return;
        }

        let proxy_process_alive = self.controller.proxy_process_running().await;
        if !proxy_process_alive {
            // The one automatic remediation: restart a proxy that is gone at
            // the OS level.
            warn!("Proxy process not running; attempting start");
            if let Err(e) = self.controller.start_proxy().await {
                error!(error = %e, "Failed to start proxy process");
            }
        }

        let proxy_responsive = self.proxy.ping().await;
        if proxy_process_alive && !proxy_responsive {
            warn!("Proxy process exists but is not answering pings");
        }

        let storage_process_alive = self.controller.storage_process_running().await;
        let storage_responsive = self.ping_storage().await;
        if !storage_responsive {
            error!("Storage engine unresponsive; manual intervention required");
        }

        // Probe fields only; lifecycle flags are owned by other writers and
        // may have changed while the probes ran.
        self.health.publish_probes(ProbeReport {
            storage_process_alive,
            proxy_process_alive,
            proxy_responsive,
            storage_responsive,
        });
    }

    /// Storage protocol ping with a bounded retry budget.
    async fn ping_storage(&self) -> bool {
        for attempt in 1..=self.config.supervision.storage_ping_attempts {
            if self.storage.ping().await {
                return true;
            }
            debug!(attempt, "Storage ping failed");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        false
    }
}
