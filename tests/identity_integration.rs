//! Identity resolution integration tests.
//!
//! Covers the four resolution strategies end to end against the in-memory
//! registry, including retry behavior under a flaky store.

#[allow(dead_code)]
mod common;

use common::{fast_config, record, FlakyStore};
use std::sync::Arc;
use warden::identity::IdentityManager;
use warden::lock::TtlRowLock;
use warden::membership::StaticMembership;
use warden::registry::{MemoryTopologyStore, TopologyStore};
use warden::token::{create_token, region_offset};
use warden::types::PLACEHOLDER_INSTANCE_ID;

fn manager_over(
    instance_id: &str,
    store: Arc<dyn TopologyStore>,
    members: Vec<&str>,
) -> IdentityManager {
    let config = fast_config(instance_id);
    let lock = Arc::new(TtlRowLock::new(Arc::clone(&store), config.lock.clone()));
    let membership = Arc::new(StaticMembership::new(
        members.into_iter().map(String::from).collect(),
    ));
    IdentityManager::new(config, store, lock, membership)
}

// =============================================================================
// Reuse and dead-namespace handling
// =============================================================================

#[tokio::test]
async fn restart_reuses_registration() {
    let store = Arc::new(MemoryTopologyStore::new());
    store.seed_record(record("us-east-1a", 4, "i-1", "400"));

    let mgr = manager_over("i-1", store.clone(), vec!["i-1"]);
    let identity = mgr.resolve().await.unwrap();

    assert_eq!(identity.record.slot_id, 4);
    assert_eq!(identity.record.token, "400");
    assert!(!identity.is_replace && !identity.is_new_token && !identity.is_token_pregenerated);
    assert_eq!(store.list_records("demo").await.unwrap().len(), 1);
}

#[tokio::test]
async fn decommissioned_node_stays_out_of_service() {
    let store = Arc::new(MemoryTopologyStore::new());
    let mut dead = record("us-east-1a", 2, "i-1", "200");
    dead.app = "demo-dead".to_string();
    store.seed_record(dead);
    // A live record also exists; the dead namespace must win.
    store.seed_record(record("us-east-1a", 2, "i-1", "200"));

    let mgr = manager_over("i-1", store, vec!["i-1"]);
    let identity = mgr.resolve().await.unwrap();
    assert!(identity.record.out_of_service);
}

// =============================================================================
// Dead-token reclamation
// =============================================================================

#[tokio::test]
async fn reclaims_first_dead_slot_in_rack() {
    let store = Arc::new(MemoryTopologyStore::new());
    store.seed_record(record("us-east-1a", 0, "i-alive", "100"));
    store.seed_record(record("us-east-1a", 1, "i-dead-1", "200"));
    store.seed_record(record("us-east-1a", 2, "i-dead-2", "300"));
    // Other racks are never reclaimed from.
    store.seed_record(record("us-east-1b", 0, "i-gone", "100"));

    let mgr = manager_over("i-new", store.clone(), vec!["i-alive", "i-new"]);
    let identity = mgr.resolve().await.unwrap();

    assert!(identity.is_replace);
    assert_eq!(identity.record.slot_id, 1);
    assert_eq!(identity.record.token, "200");
    assert_eq!(identity.replaced_ip.as_deref(), Some("10.0.0.1"));

    // The other dead slot is untouched, and no rows were added.
    let records = store.list_records("demo").await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().any(|r| r.instance_id == "i-dead-2"));
}

#[tokio::test]
async fn reclamation_survives_flaky_registry() {
    let inner = Arc::new(MemoryTopologyStore::new());
    inner.seed_record(record("us-east-1a", 0, "i-dead", "100"));
    let store = Arc::new(FlakyStore::new(inner, 2));

    let mgr = manager_over("i-new", store, vec!["i-new"]);
    let identity = mgr.resolve().await.unwrap();
    assert!(identity.is_replace);
    assert_eq!(identity.record.token, "100");
}

// =============================================================================
// Placeholder consumption
// =============================================================================

#[tokio::test]
async fn dead_slots_win_over_placeholders() {
    let store = Arc::new(MemoryTopologyStore::new());
    store.seed_record(record("us-east-1a", 0, PLACEHOLDER_INSTANCE_ID, "100"));
    store.seed_record(record("us-east-1a", 1, "i-dead", "200"));

    let mgr = manager_over("i-new", store, vec!["i-new"]);
    let identity = mgr.resolve().await.unwrap();
    assert!(identity.is_replace);
    assert_eq!(identity.record.slot_id, 1);
}

#[tokio::test]
async fn placeholder_row_is_replaced_not_duplicated() {
    let store = Arc::new(MemoryTopologyStore::new());
    store.seed_record(record("us-east-1a", 9, PLACEHOLDER_INSTANCE_ID, "900"));

    let mgr = manager_over("i-new", store.clone(), vec!["i-new"]);
    let identity = mgr.resolve().await.unwrap();

    assert!(identity.is_token_pregenerated);
    let records = store.list_records("demo").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].instance_id, "i-new");
    assert_eq!(records[0].token, "900");
}

// =============================================================================
// New allocation
// =============================================================================

#[tokio::test]
async fn new_allocation_uses_membership_position() {
    let store = Arc::new(MemoryTopologyStore::new());
    let mgr = manager_over("i-2", store.clone(), vec!["i-1", "i-2", "i-3"]);

    let identity = mgr.resolve().await.unwrap();
    let expected_slot = 1 + region_offset("us-east-1a") as i64;
    assert!(identity.is_new_token);
    assert_eq!(identity.record.slot_id, expected_slot as u64);
    assert_eq!(
        identity.record.token,
        create_token(expected_slot, 3, "us-east-1a").unwrap()
    );
}

#[tokio::test]
async fn two_nodes_allocate_distinct_slots() {
    let store = Arc::new(MemoryTopologyStore::new());
    let first = manager_over("i-1", store.clone(), vec!["i-1", "i-2"]);
    let second = manager_over("i-2", store.clone(), vec!["i-1", "i-2"]);

    let a = first.resolve().await.unwrap();
    let b = second.resolve().await.unwrap();

    assert_ne!(a.record.slot_id, b.record.slot_id);
    assert_ne!(a.record.token, b.record.token);
    assert_eq!(store.list_records("demo").await.unwrap().len(), 2);
}

// =============================================================================
// Seeds and cluster info
// =============================================================================

#[tokio::test]
async fn seed_listing_and_cluster_info() {
    let store = Arc::new(MemoryTopologyStore::new());
    store.seed_record(record("us-east-1a", 0, "i-1", "100"));
    store.seed_record(record("us-east-1b", 0, "i-2", "100"));

    let mgr = manager_over("i-1", store, vec!["i-1"]);
    let seeds = mgr.seeds().await.unwrap();
    assert_eq!(seeds, vec!["i-2.internal:8101:us-east-1b:us-east-1:100"]);

    let info = mgr.cluster_info().await.unwrap();
    assert_eq!(info.len(), 2);
    assert!(mgr.is_seed().await.unwrap());
}
