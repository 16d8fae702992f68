//! Core type definitions for the Warden sidecar.
//!
//! This module contains the fundamental data types used throughout Warden:
//! the topology registry record, the warm-bootstrap outcome, and the typed
//! command vocabulary of the proxy admin surface.
//!
//! # Key Types
//!
//! - [`NodeRecord`]: one registered cluster member, keyed by `(app, rack, slot)`
//! - [`BootstrapOutcome`]: result of a peer-sync attempt
//! - [`TrafficState`]: proxy traffic-cutover states
//! - [`ConsistencyLevel`]: proxy read/write consistency settings
//!
//! # Examples
//!
//! ```rust
//! use warden::types::{NodeRecord, PLACEHOLDER_INSTANCE_ID};
//!
//! let record = NodeRecord::builder("demo", "us-east-1a", 0)
//!     .instance_id("i-0abc")
//!     .hostname("node-0.demo.internal")
//!     .token("1808575600")
//!     .build();
//!
//! assert_eq!(record.row_key(), "demo_us-east-1a_0");
//! assert!(!record.is_placeholder());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Reserved instance id marking a slot that was provisioned ahead of time
/// with a token but no real owner yet.
pub const PLACEHOLDER_INSTANCE_ID: &str = "new_slot";

/// Slot identifier within a rack's ring allocation.
pub type SlotId = u64;

/// One row per registered cluster member.
///
/// `(app, rack, slot_id)` is unique; `token` is immutable once assigned to a
/// live slot; an instance id maps to at most one non-dead record at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Cluster name.
    pub app: String,
    /// Slot index, unique within `app` + `rack`.
    pub slot_id: SlotId,
    /// Instance id of the owning machine.
    pub instance_id: String,
    /// Hostname of the owning machine.
    pub hostname: String,
    /// Public IP of the owning machine.
    pub public_ip: String,
    /// Availability zone / rack.
    pub rack: String,
    /// Region / datacenter.
    pub datacenter: String,
    /// Ring position. Stored as a string: the registry treats it opaquely.
    pub token: String,
    /// Client-facing proxy port.
    pub client_port: u16,
    /// Peer-to-peer proxy port.
    pub peer_port: u16,
    /// True when the node was decommissioned and must not rejoin serving.
    pub out_of_service: bool,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Opaque volume metadata, rarely used.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub volumes: HashMap<String, String>,
}

impl NodeRecord {
    /// Start building a record for the given `(app, rack, slot)` key.
    pub fn builder(app: impl Into<String>, rack: impl Into<String>, slot_id: SlotId) -> NodeRecordBuilder {
        NodeRecordBuilder {
            record: NodeRecord {
                app: app.into(),
                slot_id,
                instance_id: String::new(),
                hostname: String::new(),
                public_ip: String::new(),
                rack: rack.into(),
                datacenter: String::new(),
                token: String::new(),
                client_port: 0,
                peer_port: 0,
                out_of_service: false,
                updated_at: Utc::now(),
                volumes: HashMap::new(),
            },
        }
    }

    /// Registry row key: `{app}_{rack}_{slotId}`.
    pub fn row_key(&self) -> String {
        format!("{}_{}_{}", self.app, self.rack, self.slot_id)
    }

    /// True when this row is a pre-generated placeholder with no real owner.
    pub fn is_placeholder(&self) -> bool {
        self.instance_id == PLACEHOLDER_INSTANCE_ID
    }

    /// Seed string handed to peers: `host:peerPort:rack:datacenter:token`.
    pub fn seed_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.hostname, self.peer_port, self.rack, self.datacenter, self.token
        )
    }

    /// Rewrite the ownership fields of a reclaimed record in place, keeping
    /// the slot and token. Used when a new node takes over a dead peer's
    /// ring position.
    pub fn assign_owner(
        &mut self,
        instance_id: impl Into<String>,
        hostname: impl Into<String>,
        public_ip: impl Into<String>,
        client_port: u16,
        peer_port: u16,
    ) {
        self.instance_id = instance_id.into();
        self.hostname = hostname.into();
        self.public_ip = public_ip.into();
        self.client_port = client_port;
        self.peer_port = peer_port;
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} slot={} token={} instance={} host={}",
            self.app, self.slot_id, self.token, self.instance_id, self.hostname
        )
    }
}

/// Builder for [`NodeRecord`].
#[derive(Debug)]
pub struct NodeRecordBuilder {
    record: NodeRecord,
}

impl NodeRecordBuilder {
    pub fn instance_id(mut self, v: impl Into<String>) -> Self {
        self.record.instance_id = v.into();
        self
    }

    pub fn hostname(mut self, v: impl Into<String>) -> Self {
        self.record.hostname = v.into();
        self
    }

    pub fn public_ip(mut self, v: impl Into<String>) -> Self {
        self.record.public_ip = v.into();
        self
    }

    pub fn datacenter(mut self, v: impl Into<String>) -> Self {
        self.record.datacenter = v.into();
        self
    }

    pub fn token(mut self, v: impl Into<String>) -> Self {
        self.record.token = v.into();
        self
    }

    pub fn client_port(mut self, v: u16) -> Self {
        self.record.client_port = v;
        self
    }

    pub fn peer_port(mut self, v: u16) -> Self {
        self.record.peer_port = v;
        self
    }

    pub fn out_of_service(mut self, v: bool) -> Self {
        self.record.out_of_service = v;
        self
    }

    pub fn build(self) -> NodeRecord {
        self.record
    }
}

/// Result of a peer-sync (warm bootstrap) attempt.
///
/// The first three outcomes are treated as "good enough to proceed" into the
/// traffic-cutover sequence; the last two abort without promoting local
/// storage into the cutover path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// Replication offsets converged within the configured threshold.
    InSyncSuccess,
    /// The offset gap grew for too many consecutive samples.
    RetriesExhausted,
    /// Wall-clock bootstrap budget expired before convergence.
    BootstrapTimeExpired,
    /// No reachable sync peer was found.
    CannotConnect,
    /// Too many consecutive errors while polling replication offsets.
    WarmupError,
}

impl BootstrapOutcome {
    /// True when the node may proceed through the traffic-cutover sequence
    /// with whatever data it has.
    pub fn allows_cutover(&self) -> bool {
        matches!(
            self,
            BootstrapOutcome::InSyncSuccess
                | BootstrapOutcome::RetriesExhausted
                | BootstrapOutcome::BootstrapTimeExpired
        )
    }
}

impl fmt::Display for BootstrapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BootstrapOutcome::InSyncSuccess => "in_sync_success",
            BootstrapOutcome::RetriesExhausted => "retries_exhausted",
            BootstrapOutcome::BootstrapTimeExpired => "bootstrap_time_expired",
            BootstrapOutcome::CannotConnect => "cannot_connect",
            BootstrapOutcome::WarmupError => "warmup_error",
        };
        f.write_str(s)
    }
}

/// Proxy traffic states used during the cutover sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficState {
    /// Accept writes, reject reads (node is still catching up).
    WritesOnly,
    /// Transitional state while replication hand-off completes.
    Resuming,
    /// Full serving.
    Normal,
}

impl TrafficState {
    /// Admin-surface command name for this state.
    pub fn command(&self) -> &'static str {
        match self {
            TrafficState::WritesOnly => "writes_only",
            TrafficState::Resuming => "resuming",
            TrafficState::Normal => "normal",
        }
    }
}

/// Which side of the consistency setting a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyKind {
    Read,
    Write,
}

/// Proxy consistency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    One,
    Quorum,
    DcOne,
    DcQuorum,
}

impl ConsistencyLevel {
    /// Admin-surface command name for this level.
    pub fn command(&self) -> &'static str {
        match self {
            ConsistencyLevel::One => "one",
            ConsistencyLevel::Quorum => "quorum",
            ConsistencyLevel::DcOne => "dc_one",
            ConsistencyLevel::DcQuorum => "dc_quorum",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> NodeRecord {
        NodeRecord::builder("demo", "us-east-1a", 3)
            .instance_id("i-0abc")
            .hostname("node-3.demo.internal")
            .public_ip("10.0.0.3")
            .datacenter("us-east-1")
            .token("1808575600")
            .client_port(8102)
            .peer_port(8101)
            .build()
    }

    #[test]
    fn row_key_convention() {
        assert_eq!(sample_record().row_key(), "demo_us-east-1a_3");
    }

    #[test]
    fn seed_string_format() {
        assert_eq!(
            sample_record().seed_string(),
            "node-3.demo.internal:8101:us-east-1a:us-east-1:1808575600"
        );
    }

    #[test]
    fn placeholder_detection() {
        let mut record = sample_record();
        assert!(!record.is_placeholder());
        record.instance_id = PLACEHOLDER_INSTANCE_ID.to_string();
        assert!(record.is_placeholder());
    }

    #[test]
    fn assign_owner_keeps_slot_and_token() {
        let mut record = sample_record();
        record.assign_owner("i-0new", "node-x", "10.0.0.9", 8102, 8101);
        assert_eq!(record.slot_id, 3);
        assert_eq!(record.token, "1808575600");
        assert_eq!(record.instance_id, "i-0new");
        assert_eq!(record.hostname, "node-x");
    }

    #[test]
    fn bootstrap_outcome_cutover_classification() {
        assert!(BootstrapOutcome::InSyncSuccess.allows_cutover());
        assert!(BootstrapOutcome::RetriesExhausted.allows_cutover());
        assert!(BootstrapOutcome::BootstrapTimeExpired.allows_cutover());
        assert!(!BootstrapOutcome::CannotConnect.allows_cutover());
        assert!(!BootstrapOutcome::WarmupError.allows_cutover());
    }

    #[test]
    fn record_serde_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: NodeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
