//! Process control and engine admin surfaces.
//!
//! Warden coordinates three local collaborators: the OS-level process
//! controller (start/stop/liveness of the proxy and storage processes), the
//! proxy's admin surface (protocol ping, traffic-state and consistency
//! commands), and the storage engine (ping, uptime, replication offsets,
//! replica control). Each is a trait so the concrete transport (HTTP admin
//! endpoint, storage wire protocol) stays outside this crate; only the
//! command vocabulary is fixed here.

pub mod shell;

pub use shell::ShellProcessController;

use crate::error::Result;
use crate::types::{ConsistencyKind, ConsistencyLevel, TrafficState};
use async_trait::async_trait;

/// OS-level lifecycle of the local proxy and storage processes.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Start the proxy process.
    async fn start_proxy(&self) -> Result<()>;

    /// Stop the proxy process.
    async fn stop_proxy(&self) -> Result<()>;

    /// True when a proxy process exists at the OS level. Says nothing about
    /// responsiveness.
    async fn proxy_process_running(&self) -> bool;

    /// True when a storage process exists at the OS level.
    async fn storage_process_running(&self) -> bool;
}

/// The proxy's admin surface.
#[async_trait]
pub trait ProxyAdmin: Send + Sync {
    /// Protocol-level ping. Returns false on any failure.
    async fn ping(&self) -> bool;

    /// Transition the proxy's traffic state (`writes_only`, `resuming`,
    /// `normal`).
    async fn set_traffic_state(&self, state: TrafficState) -> Result<()>;

    /// Set the proxy's read or write consistency level.
    async fn set_consistency(&self, kind: ConsistencyKind, level: ConsistencyLevel) -> Result<()>;
}

/// The local storage engine's control surface.
///
/// One implementation per engine variant (Redis, a RocksDB-backed compatible
/// engine, memcached), selected by configuration at startup.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Protocol-level ping. Returns false on any failure.
    async fn ping(&self) -> bool;

    /// Seconds since the engine process started.
    async fn uptime_seconds(&self) -> Result<u64>;

    /// Replication offset reported in the engine's master role.
    async fn master_replication_offset(&self) -> Result<u64>;

    /// Replication offset reported in the engine's replica role. Zero until
    /// the initial sync starts moving.
    async fn slave_replication_offset(&self) -> Result<u64>;

    /// Begin replicating from a peer (subordinate/master relationship).
    async fn start_replica_of(&self, peer_host: &str, peer_port: u16) -> Result<()>;

    /// Stop replica mode and serve as a standalone master.
    async fn promote_to_master(&self) -> Result<()>;
}

/// A remote peer's storage engine, as reachable over the network.
#[async_trait]
pub trait StoragePeer: Send + Sync + std::fmt::Debug {
    /// Protocol-level ping. Returns false on any failure.
    async fn ping(&self) -> bool;

    /// Seconds since the peer's engine started.
    async fn uptime_seconds(&self) -> Result<u64>;

    /// The peer's master replication offset.
    async fn master_replication_offset(&self) -> Result<u64>;
}

/// Dials storage peers.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Connect to a peer's storage engine. Errors map to unreachable peers
    /// during bootstrap peer selection.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn StoragePeer>>;
}
