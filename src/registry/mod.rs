//! Topology registry access.
//!
//! The registry is a shared, eventually consistent store of [`NodeRecord`]s
//! keyed by `(cluster, rack, slot)`, with per-cell TTL support used by the
//! advisory lock. The backing store is pluggable (a column store or any
//! key/value store with TTLs); only the semantics of the [`TopologyStore`]
//! trait are required. Reads are lock-free and may observe stale data;
//! creates and deletes are serialized by the distributed lock one layer up.

pub mod memory;

pub use memory::MemoryTopologyStore;

use crate::error::Result;
use crate::types::{NodeRecord, SlotId};
use async_trait::async_trait;
use std::time::Duration;

/// Logical table holding the advisory lock rows.
pub const LOCKS_TABLE: &str = "locks";

/// Row key of the short-TTL `choosing` row for a slot: `{app}_{rack}_{slotId}-choosing`.
pub fn choosing_row_key(slot_key: &str) -> String {
    format!("{}-choosing", slot_key)
}

/// Row key of the long-TTL `locking` row for a slot: `{app}_{rack}_{slotId}-lock`.
pub fn lock_row_key(slot_key: &str) -> String {
    format!("{}-lock", slot_key)
}

/// Typed access to the shared topology registry.
///
/// Implementations must be safe to share across tasks. All methods carry
/// implementation-level timeouts and surface transport failures as
/// [`crate::error::WardenError::RegistryUnavailable`].
#[async_trait]
pub trait TopologyStore: Send + Sync {
    /// List every record registered under a cluster namespace, in
    /// registration order.
    async fn list_records(&self, app: &str) -> Result<Vec<NodeRecord>>;

    /// List the records of one cluster restricted to a datacenter.
    async fn list_records_in_region(&self, app: &str, datacenter: &str) -> Result<Vec<NodeRecord>>;

    /// Fetch a single record by its `(app, rack, slot)` key.
    async fn get_record(&self, app: &str, rack: &str, slot_id: SlotId) -> Result<Option<NodeRecord>>;

    /// Create (or replace) a record under its `(app, rack, slot)` key.
    async fn create_record(&self, record: &NodeRecord) -> Result<()>;

    /// Delete a record by its `(app, rack, slot)` key.
    async fn delete_record(&self, record: &NodeRecord) -> Result<()>;

    /// Write one cell under `(table, row_key, column)`, optionally expiring
    /// after `ttl`.
    async fn put_cell(
        &self,
        table: &str,
        row_key: &str,
        column: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Read all live cells of a row as `(column, value)` pairs.
    async fn get_cells(&self, table: &str, row_key: &str) -> Result<Vec<(String, String)>>;

    /// Count the live columns of a row.
    async fn count_columns(&self, table: &str, row_key: &str) -> Result<usize>;

    /// Delete one cell. Deleting an absent cell is not an error.
    async fn delete_cell(&self, table: &str, row_key: &str, column: &str) -> Result<()>;
}
