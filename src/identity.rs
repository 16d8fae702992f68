//! Node identity resolution.
//!
//! On startup the identity manager gives this node a durable, race-free ring
//! position. Four strategies are tried strictly in order, first success wins,
//! each wrapped in bounded retry with randomized backoff:
//!
//! 1. **Reuse** an existing registration (including the decommissioned check
//!    against the `{app}-dead` namespace).
//! 2. **Reclaim** the slot of a dead peer: a live record whose instance is no
//!    longer present in the membership listing.
//! 3. **Consume** a pre-generated placeholder slot.
//! 4. **Allocate** a brand-new slot and token from the membership ordering.
//!
//! Registry mutations in steps 2-4 run under the distributed slot lock. Each
//! scanning pass re-populates a rack-keyed snapshot of the registry first so
//! one pass sees one consistent view.
//!
//! Reclamation trusts the membership listing alone: a record whose instance
//! is merely slow to report, rather than dead, could in principle be
//! reclaimed. That matches the observed fleet behavior this module encodes;
//! a freshness check on `updated_at` would be the stricter alternative.

use crate::config::WardenConfig;
use crate::error::{Result, WardenError};
use crate::lock::DistributedLock;
use crate::membership::MembershipSource;
use crate::registry::TopologyStore;
use crate::retry::{jitter_sleep, RetryConfig, RetryExecutor};
use crate::token::{create_token, region_offset};
use crate::types::NodeRecord;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// The resolved identity of this node.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    /// This node's registry record.
    pub record: NodeRecord,
    /// True when the node took over a dead peer's slot.
    pub is_replace: bool,
    /// True when the node consumed a pre-generated placeholder slot.
    pub is_token_pregenerated: bool,
    /// True when a brand-new slot and token were allocated.
    pub is_new_token: bool,
    /// IP of the dead peer this node replaced, when `is_replace`.
    pub replaced_ip: Option<String>,
}

impl NodeIdentity {
    fn reused(record: NodeRecord) -> Self {
        Self {
            record,
            is_replace: false,
            is_token_pregenerated: false,
            is_new_token: false,
            replaced_ip: None,
        }
    }
}

/// Resolves and maintains this node's registration in the topology store.
pub struct IdentityManager {
    config: WardenConfig,
    store: Arc<dyn TopologyStore>,
    lock: Arc<dyn DistributedLock>,
    membership: Arc<dyn MembershipSource>,
}

impl IdentityManager {
    pub fn new(
        config: WardenConfig,
        store: Arc<dyn TopologyStore>,
        lock: Arc<dyn DistributedLock>,
        membership: Arc<dyn MembershipSource>,
    ) -> Self {
        Self {
            config,
            store,
            lock,
            membership,
        }
    }

    fn retry(&self, operation: &'static str) -> RetryExecutor {
        RetryExecutor::new(
            operation,
            RetryConfig {
                max_attempts: self.config.identity.max_attempts,
                initial_delay: self.config.identity.retry_initial_delay,
                max_delay: self.config.identity.retry_max_delay,
                ..RetryConfig::default()
            },
        )
    }

    /// Resolve this node's identity. Blocks node initialization; failure
    /// here is fatal at startup since a node cannot serve without a token.
    pub async fn resolve(&self) -> Result<NodeIdentity> {
        if let Some(identity) = self.retry("reuse-existing").execute(|| self.reuse_existing()).await? {
            info!(record = %identity.record, out_of_service = identity.record.out_of_service,
                "Reusing existing registration");
            return Ok(identity);
        }

        // Spread simultaneous starters before scanning for reclaimable
        // slots; a replaced autoscaling group boots whole racks at once.
        jitter_sleep(
            self.config.identity.reclaim_jitter_min,
            self.config.identity.reclaim_jitter_max,
        )
        .await;

        if let Some(identity) = self.retry("reclaim-dead-token").execute(|| self.reclaim_dead()).await? {
            info!(record = %identity.record, replaced_ip = ?identity.replaced_ip,
                "Reclaimed dead peer's slot");
            return Ok(identity);
        }

        if let Some(identity) = self
            .retry("claim-pregenerated-token")
            .execute(|| self.claim_placeholder())
            .await?
        {
            info!(record = %identity.record, "Consumed pre-generated slot");
            return Ok(identity);
        }

        let identity = self.retry("allocate-new-token").execute(|| self.allocate_new()).await?;
        info!(record = %identity.record, "Allocated new slot");
        Ok(identity)
    }

    /// Step 1: look for a registration that already belongs to this
    /// instance, checking the dead namespace first.
    async fn reuse_existing(&self) -> Result<Option<NodeIdentity>> {
        let instance_id = &self.config.node.instance_id;

        let dead = self
            .store
            .list_records(&self.config.cluster.dead_namespace())
            .await?;
        if let Some(record) = dead.iter().find(|r| &r.instance_id == instance_id) {
            // This node was decommissioned. Register the fact and stay out
            // of the serving path.
            let mut record = record.clone();
            record.out_of_service = true;
            warn!(record = %record, "Instance found in dead namespace; staying out of service");
            return Ok(Some(NodeIdentity::reused(record)));
        }

        let live = self.store.list_records(&self.config.cluster.name).await?;
        Ok(live
            .into_iter()
            .find(|r| &r.instance_id == instance_id)
            .map(NodeIdentity::reused))
    }

    /// Step 2: scan this rack for a record whose instance has left the
    /// membership listing and take over its slot under lock.
    async fn reclaim_dead(&self) -> Result<Option<NodeIdentity>> {
        let rack_map = self.populate_rack_map().await?;
        let members: HashSet<String> = self
            .membership
            .list_rack_members()
            .await?
            .into_iter()
            .collect();

        let Some(rack_records) = rack_map.get(&self.config.cluster.rack) else {
            return Ok(None);
        };

        let Some(dead) = rack_records
            .iter()
            .find(|r| !r.is_placeholder() && !members.contains(&r.instance_id))
        else {
            return Ok(None);
        };

        let slot_key = dead.row_key();
        let holder = &self.config.node.instance_id;
        self.lock.acquire(&slot_key, holder).await?;

        let result = async {
            let mut record = dead.clone();
            let replaced_ip = record.public_ip.clone();
            record.assign_owner(
                holder,
                &self.config.node.hostname,
                &self.config.node.public_ip,
                self.config.node.client_port,
                self.config.node.peer_port,
            );
            self.store.create_record(&record).await?;
            Ok(NodeIdentity {
                record,
                is_replace: true,
                is_token_pregenerated: false,
                is_new_token: false,
                replaced_ip: Some(replaced_ip),
            })
        }
        .await;

        self.lock.release(&slot_key, holder).await;
        result.map(Some)
    }

    /// Step 3: consume a pre-generated placeholder slot under lock.
    async fn claim_placeholder(&self) -> Result<Option<NodeIdentity>> {
        let rack_map = self.populate_rack_map().await?;
        let Some(rack_records) = rack_map.get(&self.config.cluster.rack) else {
            return Ok(None);
        };

        let Some(placeholder) = rack_records.iter().find(|r| r.is_placeholder()) else {
            return Ok(None);
        };

        let slot_key = placeholder.row_key();
        let holder = &self.config.node.instance_id;
        self.lock.acquire(&slot_key, holder).await?;

        let result = async {
            self.store.delete_record(placeholder).await?;
            let record = NodeRecord::builder(
                &self.config.cluster.name,
                &self.config.cluster.rack,
                placeholder.slot_id,
            )
            .instance_id(holder)
            .hostname(&self.config.node.hostname)
            .public_ip(&self.config.node.public_ip)
            .datacenter(&self.config.cluster.datacenter)
            .token(&placeholder.token)
            .client_port(self.config.node.client_port)
            .peer_port(self.config.node.peer_port)
            .build();
            self.store.create_record(&record).await?;
            Ok(NodeIdentity {
                record,
                is_replace: false,
                is_token_pregenerated: true,
                is_new_token: false,
                replaced_ip: None,
            })
        }
        .await;

        self.lock.release(&slot_key, holder).await;
        result.map(Some)
    }

    /// Step 4: allocate a fresh slot from the membership ordering and create
    /// its record under lock.
    async fn allocate_new(&self) -> Result<NodeIdentity> {
        let members = self.membership.list_rack_members().await?;
        let instance_id = &self.config.node.instance_id;

        let slot_index = members
            .iter()
            .position(|m| m == instance_id)
            .ok_or_else(|| WardenError::NotInMembership {
                instance_id: instance_id.clone(),
            })?;

        let mut ring_size = members.len();
        if self.config.cluster.dual_account {
            ring_size += self.membership.list_cross_account_members().await?.len();
        }

        let rack = &self.config.cluster.rack;
        let slot_id = slot_index as i64 + region_offset(rack) as i64;
        let token = create_token(slot_id, ring_size as i64, rack)?;

        let record = NodeRecord::builder(&self.config.cluster.name, rack, slot_id as u64)
            .instance_id(instance_id)
            .hostname(&self.config.node.hostname)
            .public_ip(&self.config.node.public_ip)
            .datacenter(&self.config.cluster.datacenter)
            .token(token)
            .client_port(self.config.node.client_port)
            .peer_port(self.config.node.peer_port)
            .build();

        let slot_key = record.row_key();
        self.lock.acquire(&slot_key, instance_id).await?;

        let result = async {
            // A competing starter with the same membership view would
            // compute the same slot; the lock plus this read close the race.
            if let Some(existing) = self
                .store
                .get_record(&record.app, &record.rack, record.slot_id)
                .await?
            {
                if existing.instance_id != *instance_id {
                    return Err(WardenError::LockContention { slot: slot_key.clone() });
                }
            }
            self.store.create_record(&record).await?;
            Ok(NodeIdentity {
                record: record.clone(),
                is_replace: false,
                is_token_pregenerated: false,
                is_new_token: true,
                replaced_ip: None,
            })
        }
        .await;

        self.lock.release(&slot_key, instance_id).await;
        result
    }

    /// Snapshot the live registry grouped by rack, preserving registration
    /// order within each rack.
    async fn populate_rack_map(&self) -> Result<BTreeMap<String, Vec<NodeRecord>>> {
        let records = self.store.list_records(&self.config.cluster.name).await?;
        let mut map: BTreeMap<String, Vec<NodeRecord>> = BTreeMap::new();
        for record in records {
            map.entry(record.rack.clone()).or_default().push(record);
        }
        Ok(map)
    }

    /// Seed strings of every live peer, `host:peerPort:rack:datacenter:token`,
    /// excluding this node.
    pub async fn seeds(&self) -> Result<Vec<String>> {
        let records = self.store.list_records(&self.config.cluster.name).await?;
        Ok(records
            .iter()
            .filter(|r| r.instance_id != self.config.node.instance_id)
            .map(NodeRecord::seed_string)
            .collect())
    }

    /// Every live record of the cluster, freshly read.
    pub async fn cluster_info(&self) -> Result<Vec<NodeRecord>> {
        self.store.list_records(&self.config.cluster.name).await
    }

    /// True when this node's hostname is the first registrant of its rack.
    pub async fn is_seed(&self) -> Result<bool> {
        let rack_map = self.populate_rack_map().await?;
        Ok(rack_map
            .get(&self.config.cluster.rack)
            .and_then(|records| records.first())
            .map(|first| first.hostname == self.config.node.hostname)
            .unwrap_or(false))
    }
}
