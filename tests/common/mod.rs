//! Shared fixtures for Warden integration tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warden::config::{LockConfig, WardenConfig};
use warden::error::{Result, WardenError};
use warden::registry::{MemoryTopologyStore, TopologyStore};
use warden::types::{NodeRecord, SlotId};

/// A config tuned for fast tests: millisecond poll intervals and jitter.
pub fn fast_config(instance_id: &str) -> WardenConfig {
    let mut config = WardenConfig::development();
    config.node.instance_id = instance_id.to_string();
    config.node.hostname = format!("{}.internal", instance_id);
    config.node.public_ip = "10.0.0.42".to_string();
    config.identity.reclaim_jitter_min = Duration::from_millis(1);
    config.identity.reclaim_jitter_max = Duration::from_millis(2);
    config.identity.retry_initial_delay = Duration::from_millis(1);
    config.identity.retry_max_delay = Duration::from_millis(5);
    config.lock = LockConfig {
        confirm_delay: Duration::from_millis(2),
        ..LockConfig::default()
    };
    config.bootstrap.poll_interval = Duration::from_millis(2);
    config.bootstrap.convergence_threshold_bytes = 10;
    config.bootstrap.max_duration = Duration::from_millis(200);
    config.bootstrap.max_growth_samples = 10;
    config.bootstrap.max_poll_errors = 5;
    config.bootstrap.drain_interval = Duration::from_millis(2);
    config.bootstrap.proxy_ping_attempts = 3;
    config.supervision.tick_interval = Duration::from_millis(10);
    config.supervision.storage_ping_attempts = 2;
    config
}

/// Build a live record in cluster `demo`.
pub fn record(rack: &str, slot: SlotId, instance: &str, token: &str) -> NodeRecord {
    NodeRecord::builder("demo", rack, slot)
        .instance_id(instance)
        .hostname(format!("{}.internal", instance))
        .public_ip("10.0.0.1")
        .datacenter("us-east-1")
        .token(token)
        .client_port(8102)
        .peer_port(8101)
        .build()
}

/// Store wrapper that fails the first N listing calls, for retry tests.
pub struct FlakyStore {
    inner: Arc<MemoryTopologyStore>,
    failures_left: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryTopologyStore>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
        }
    }

    fn maybe_fail(&self) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(WardenError::RegistryUnavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TopologyStore for FlakyStore {
    async fn list_records(&self, app: &str) -> Result<Vec<NodeRecord>> {
        self.maybe_fail()?;
        self.inner.list_records(app).await
    }

    async fn list_records_in_region(&self, app: &str, datacenter: &str) -> Result<Vec<NodeRecord>> {
        self.maybe_fail()?;
        self.inner.list_records_in_region(app, datacenter).await
    }

    async fn get_record(&self, app: &str, rack: &str, slot_id: SlotId) -> Result<Option<NodeRecord>> {
        self.inner.get_record(app, rack, slot_id).await
    }

    async fn create_record(&self, record: &NodeRecord) -> Result<()> {
        self.inner.create_record(record).await
    }

    async fn delete_record(&self, record: &NodeRecord) -> Result<()> {
        self.inner.delete_record(record).await
    }

    async fn put_cell(
        &self,
        table: &str,
        row_key: &str,
        column: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.inner.put_cell(table, row_key, column, value, ttl).await
    }

    async fn get_cells(&self, table: &str, row_key: &str) -> Result<Vec<(String, String)>> {
        self.inner.get_cells(table, row_key).await
    }

    async fn count_columns(&self, table: &str, row_key: &str) -> Result<usize> {
        self.inner.count_columns(table, row_key).await
    }

    async fn delete_cell(&self, table: &str, row_key: &str, column: &str) -> Result<()> {
        self.inner.delete_cell(table, row_key, column).await
    }
}
