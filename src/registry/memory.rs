//! In-memory topology store.
//!
//! TTL-aware implementation of [`TopologyStore`] backing the development
//! preset and the test suites. Production deployments bind the trait to a
//! real column store; this implementation keeps the same observable
//! semantics: registration-ordered listings, upsert on create, and cells
//! that silently disappear when their TTL lapses.

use super::TopologyStore;
use crate::error::Result;
use crate::types::{NodeRecord, SlotId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Cell {
    value: String,
    expires_at: Option<Instant>,
}

impl Cell {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| t > now)
    }
}

#[derive(Default)]
struct Inner {
    /// Records per cluster namespace, in registration order.
    records: HashMap<String, Vec<NodeRecord>>,
    /// Cells keyed by `(table, row_key)` then column.
    cells: HashMap<(String, String), HashMap<String, Cell>>,
}

/// In-memory [`TopologyStore`] with TTL cells.
#[derive(Default)]
pub struct MemoryTopologyStore {
    inner: RwLock<Inner>,
}

impl MemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the lock protocol. Test and
    /// development helper.
    pub fn seed_record(&self, record: NodeRecord) {
        let mut inner = self.inner.write();
        let records = inner.records.entry(record.app.clone()).or_default();
        records.retain(|r| !(r.rack == record.rack && r.slot_id == record.slot_id));
        records.push(record);
    }

    fn purge_expired(row: &mut HashMap<String, Cell>) {
        let now = Instant::now();
        row.retain(|_, cell| cell.is_live(now));
    }
}

#[async_trait]
impl TopologyStore for MemoryTopologyStore {
    async fn list_records(&self, app: &str) -> Result<Vec<NodeRecord>> {
        Ok(self
            .inner
            .read()
            .records
            .get(app)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_records_in_region(&self, app: &str, datacenter: &str) -> Result<Vec<NodeRecord>> {
        Ok(self
            .inner
            .read()
            .records
            .get(app)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.datacenter == datacenter)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_record(&self, app: &str, rack: &str, slot_id: SlotId) -> Result<Option<NodeRecord>> {
        Ok(self.inner.read().records.get(app).and_then(|records| {
            records
                .iter()
                .find(|r| r.rack == rack && r.slot_id == slot_id)
                .cloned()
        }))
    }

    async fn create_record(&self, record: &NodeRecord) -> Result<()> {
        self.seed_record(record.clone());
        Ok(())
    }

    async fn delete_record(&self, record: &NodeRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(records) = inner.records.get_mut(&record.app) {
            records.retain(|r| !(r.rack == record.rack && r.slot_id == record.slot_id));
        }
        Ok(())
    }

    async fn put_cell(
        &self,
        table: &str,
        row_key: &str,
        column: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let row = inner
            .cells
            .entry((table.to_string(), row_key.to_string()))
            .or_default();
        row.insert(
            column.to_string(),
            Cell {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get_cells(&self, table: &str, row_key: &str) -> Result<Vec<(String, String)>> {
        let mut inner = self.inner.write();
        let Some(row) = inner
            .cells
            .get_mut(&(table.to_string(), row_key.to_string()))
        else {
            return Ok(Vec::new());
        };
        Self::purge_expired(row);
        let mut cells: Vec<(String, String)> = row
            .iter()
            .map(|(column, cell)| (column.clone(), cell.value.clone()))
            .collect();
        cells.sort();
        Ok(cells)
    }

    async fn count_columns(&self, table: &str, row_key: &str) -> Result<usize> {
        Ok(self.get_cells(table, row_key).await?.len())
    }

    async fn delete_cell(&self, table: &str, row_key: &str, column: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(row) = inner
            .cells
            .get_mut(&(table.to_string(), row_key.to_string()))
        {
            row.remove(column);
        }
        Ok(())
    }
}
