//! Distributed advisory locking for registry mutations.
//!
//! Serializes create/delete of one slot's registry row between well-behaved
//! claimants using two TTL rows per slot in the backing store: a `choosing`
//! row with a very short TTL and a `locking` row with a long TTL.
//!
//! This lock is **advisory, not linearizable**: it has no fencing tokens, so
//! a crashed holder's `locking` entry can block the slot for up to the long
//! TTL. Callers must treat [`WardenError::LockHeldByOther`] as retryable by
//! re-running the whole enclosing operation, never as fatal. `release` is
//! best-effort; the TTLs are the correctness backstop.

use crate::config::LockConfig;
use crate::error::{Result, WardenError};
use crate::registry::{choosing_row_key, lock_row_key, TopologyStore, LOCKS_TABLE};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Advisory mutual exclusion on one slot key.
///
/// Kept as a named abstraction so the backing store (column store, key/value
/// store with TTL) can be swapped without touching callers.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire the lock for `slot_key` on behalf of `holder_id`.
    ///
    /// Fails with [`WardenError::LockContention`], `LockHeldByOther`, or
    /// `LockRaceLost`; all three mean "back off and retry the enclosing
    /// operation".
    async fn acquire(&self, slot_key: &str, holder_id: &str) -> Result<()>;

    /// Release the lock. Best-effort: errors are logged and discarded.
    async fn release(&self, slot_key: &str, holder_id: &str);
}

/// Two-phase TTL-row lock over a [`TopologyStore`].
pub struct TtlRowLock {
    store: Arc<dyn TopologyStore>,
    config: LockConfig,
}

impl TtlRowLock {
    pub fn new(store: Arc<dyn TopologyStore>, config: LockConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl DistributedLock for TtlRowLock {
    async fn acquire(&self, slot_key: &str, holder_id: &str) -> Result<()> {
        let choosing_key = choosing_row_key(slot_key);
        let lock_key = lock_row_key(slot_key);

        // Phase 1: announce intent in the short-TTL choosing row.
        self.store
            .put_cell(
                LOCKS_TABLE,
                &choosing_key,
                holder_id,
                holder_id,
                Some(self.config.choosing_ttl),
            )
            .await?;

        let claimants = self.store.count_columns(LOCKS_TABLE, &choosing_key).await?;
        if claimants > 1 {
            // Another claimant is racing this slot. Step aside and let the
            // caller back off.
            self.store
                .delete_cell(LOCKS_TABLE, &choosing_key, holder_id)
                .await?;
            debug!(slot = slot_key, claimants, "Choosing row contended");
            return Err(WardenError::LockContention {
                slot: slot_key.to_string(),
            });
        }

        // Phase 2: take the long-TTL locking row, unless someone holds it.
        let holders = self.store.get_cells(LOCKS_TABLE, &lock_key).await?;
        if holders.len() == 1 && holders[0].0 != holder_id {
            return Err(WardenError::LockHeldByOther {
                slot: slot_key.to_string(),
                holder: holders[0].0.clone(),
            });
        }

        self.store
            .put_cell(
                LOCKS_TABLE,
                &lock_key,
                holder_id,
                holder_id,
                Some(self.config.lock_ttl),
            )
            .await?;

        // Confirmation read after a settle delay: we won only if we are the
        // sole holder.
        tokio::time::sleep(self.config.confirm_delay).await;
        let holders = self.store.get_cells(LOCKS_TABLE, &lock_key).await?;
        if holders.len() == 1 && holders[0].0 == holder_id {
            debug!(slot = slot_key, holder = holder_id, "Lock acquired");
            Ok(())
        } else {
            Err(WardenError::LockRaceLost {
                slot: slot_key.to_string(),
            })
        }
    }

    async fn release(&self, slot_key: &str, holder_id: &str) {
        let choosing_key = choosing_row_key(slot_key);
        if let Err(e) = self
            .store
            .delete_cell(LOCKS_TABLE, &choosing_key, holder_id)
            .await
        {
            // TTL expiry is the fallback safety net.
            warn!(slot = slot_key, error = %e, "Failed to release choosing entry");
        }
    }
}
