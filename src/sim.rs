//! Single-process simulation harness.
//!
//! Scriptable implementations of the process/storage/proxy collaborator
//! traits, used by the development server mode and the integration tests.
//! Production deployments replace these with real bindings (the storage
//! engine's wire protocol, the proxy's admin endpoint, the host's process
//! manager); everything in this module stays in one process and answers
//! from scripted state.

use crate::error::{Result, WardenError};
use crate::process::{
    PeerConnector, ProcessController, ProxyAdmin, StorageEngine, StoragePeer,
};
use crate::types::{ConsistencyKind, ConsistencyLevel, TrafficState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// One scripted offset sample: a value or a protocol error message.
pub type OffsetSample = std::result::Result<u64, String>;

#[derive(Default)]
struct EngineState {
    ping_ok: bool,
    uptime: u64,
    master_offset: u64,
    slave_offsets: VecDeque<OffsetSample>,
    last_slave_offset: u64,
    replica_of: Option<(String, u16)>,
    promoted: bool,
}

/// Scriptable local storage engine.
#[derive(Default)]
pub struct SimStorageEngine {
    state: Mutex<EngineState>,
}

impl SimStorageEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.state.lock().ping_ok = true;
        engine
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.state.lock().ping_ok = ok;
    }

    pub fn set_uptime(&self, seconds: u64) {
        self.state.lock().uptime = seconds;
    }

    pub fn set_master_offset(&self, offset: u64) {
        self.state.lock().master_offset = offset;
    }

    /// Queue the replica-offset samples the engine reports, in order. Once
    /// the script runs out, the last value repeats.
    pub fn script_slave_offsets<I: IntoIterator<Item = OffsetSample>>(&self, samples: I) {
        self.state.lock().slave_offsets.extend(samples);
    }

    /// Peer this engine was told to replicate from, if any.
    pub fn replica_target(&self) -> Option<(String, u16)> {
        self.state.lock().replica_of.clone()
    }

    pub fn is_promoted(&self) -> bool {
        self.state.lock().promoted
    }
}

#[async_trait]
impl StorageEngine for SimStorageEngine {
    async fn ping(&self) -> bool {
        self.state.lock().ping_ok
    }

    async fn uptime_seconds(&self) -> Result<u64> {
        Ok(self.state.lock().uptime)
    }

    async fn master_replication_offset(&self) -> Result<u64> {
        Ok(self.state.lock().master_offset)
    }

    async fn slave_replication_offset(&self) -> Result<u64> {
        let mut state = self.state.lock();
        match state.slave_offsets.pop_front() {
            Some(Ok(offset)) => {
                state.last_slave_offset = offset;
                Ok(offset)
            }
            Some(Err(message)) => Err(WardenError::Storage(message)),
            None => Ok(state.last_slave_offset),
        }
    }

    async fn start_replica_of(&self, peer_host: &str, peer_port: u16) -> Result<()> {
        self.state.lock().replica_of = Some((peer_host.to_string(), peer_port));
        Ok(())
    }

    async fn promote_to_master(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.replica_of = None;
        state.promoted = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PeerState {
    ping_ok: bool,
    uptime: u64,
    master_offsets: VecDeque<OffsetSample>,
    last_master_offset: u64,
}

/// Scriptable remote storage peer.
#[derive(Debug, Default)]
pub struct SimStoragePeer {
    state: Mutex<PeerState>,
}

impl SimStoragePeer {
    pub fn new(uptime: u64) -> Self {
        let peer = Self::default();
        {
            let mut state = peer.state.lock();
            state.ping_ok = true;
            state.uptime = uptime;
        }
        peer
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.state.lock().ping_ok = ok;
    }

    /// Queue the master-offset samples the peer reports, in order. Once the
    /// script runs out, the last value repeats.
    pub fn script_master_offsets<I: IntoIterator<Item = OffsetSample>>(&self, samples: I) {
        self.state.lock().master_offsets.extend(samples);
    }
}

#[async_trait]
impl StoragePeer for Arc<SimStoragePeer> {
    async fn ping(&self) -> bool {
        self.state.lock().ping_ok
    }

    async fn uptime_seconds(&self) -> Result<u64> {
        Ok(self.state.lock().uptime)
    }

    async fn master_replication_offset(&self) -> Result<u64> {
        let mut state = self.state.lock();
        match state.master_offsets.pop_front() {
            Some(Ok(offset)) => {
                state.last_master_offset = offset;
                Ok(offset)
            }
            Some(Err(message)) => Err(WardenError::Storage(message)),
            None => Ok(state.last_master_offset),
        }
    }
}

/// Connector resolving hostnames to scripted peers.
#[derive(Default)]
pub struct SimPeerConnector {
    peers: Mutex<HashMap<String, Arc<SimStoragePeer>>>,
}

impl SimPeerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, host: impl Into<String>, peer: Arc<SimStoragePeer>) {
        self.peers.lock().insert(host.into(), peer);
    }
}

#[async_trait]
impl PeerConnector for SimPeerConnector {
    async fn connect(&self, host: &str, _port: u16) -> Result<Box<dyn StoragePeer>> {
        match self.peers.lock().get(host) {
            Some(peer) => Ok(Box::new(Arc::clone(peer))),
            None => Err(WardenError::CannotConnect(format!("no route to {}", host))),
        }
    }
}

/// Proxy admin surface that records every command it receives.
pub struct RecordingProxyAdmin {
    ping_ok: AtomicBool,
    transitions: Mutex<Vec<TrafficState>>,
    consistency: Mutex<Vec<(ConsistencyKind, ConsistencyLevel)>>,
}

impl Default for RecordingProxyAdmin {
    fn default() -> Self {
        Self {
            ping_ok: AtomicBool::new(true),
            transitions: Mutex::new(Vec::new()),
            consistency: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingProxyAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ping_ok(&self, ok: bool) {
        self.ping_ok.store(ok, Ordering::SeqCst);
    }

    /// Traffic-state commands received so far, in order.
    pub fn transitions(&self) -> Vec<TrafficState> {
        self.transitions.lock().clone()
    }

    pub fn consistency_commands(&self) -> Vec<(ConsistencyKind, ConsistencyLevel)> {
        self.consistency.lock().clone()
    }
}

#[async_trait]
impl ProxyAdmin for RecordingProxyAdmin {
    async fn ping(&self) -> bool {
        self.ping_ok.load(Ordering::SeqCst)
    }

    async fn set_traffic_state(&self, state: TrafficState) -> Result<()> {
        self.transitions.lock().push(state);
        Ok(())
    }

    async fn set_consistency(&self, kind: ConsistencyKind, level: ConsistencyLevel) -> Result<()> {
        self.consistency.lock().push((kind, level));
        Ok(())
    }
}

/// Process controller over in-memory process flags.
pub struct SimProcessController {
    proxy_running: AtomicBool,
    storage_running: AtomicBool,
    proxy_start_calls: AtomicU32,
    fail_proxy_start: AtomicBool,
}

impl Default for SimProcessController {
    fn default() -> Self {
        Self {
            proxy_running: AtomicBool::new(false),
            storage_running: AtomicBool::new(true),
            proxy_start_calls: AtomicU32::new(0),
            fail_proxy_start: AtomicBool::new(false),
        }
    }
}

impl SimProcessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_proxy_running(&self, running: bool) {
        self.proxy_running.store(running, Ordering::SeqCst);
    }

    pub fn set_storage_running(&self, running: bool) {
        self.storage_running.store(running, Ordering::SeqCst);
    }

    pub fn set_fail_proxy_start(&self, fail: bool) {
        self.fail_proxy_start.store(fail, Ordering::SeqCst);
    }

    /// How many times `start_proxy` was invoked.
    pub fn proxy_start_calls(&self) -> u32 {
        self.proxy_start_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessController for SimProcessController {
    async fn start_proxy(&self) -> Result<()> {
        self.proxy_start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_proxy_start.load(Ordering::SeqCst) {
            return Err(WardenError::ProcessControl("simulated start failure".into()));
        }
        self.proxy_running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_proxy(&self) -> Result<()> {
        self.proxy_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn proxy_process_running(&self) -> bool {
        self.proxy_running.load(Ordering::SeqCst)
    }

    async fn storage_process_running(&self) -> bool {
        self.storage_running.load(Ordering::SeqCst)
    }
}
