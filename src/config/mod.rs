//! Configuration module for Warden.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for a Warden sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Cluster-level identity.
    pub cluster: ClusterConfig,
    /// This node's identity.
    pub node: NodeConfig,
    /// Advisory lock tuning.
    pub lock: LockConfig,
    /// Identity resolution tuning.
    pub identity: IdentityConfig,
    /// Warm bootstrap tuning.
    pub bootstrap: BootstrapConfig,
    /// Supervision loop tuning.
    pub supervision: SupervisionConfig,
    /// Process controller settings.
    pub process: ProcessConfig,
}

impl WardenConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.name.is_empty() {
            return Err(WardenError::InvalidConfig {
                field: "cluster.name".to_string(),
                reason: "Cluster name must be non-empty".to_string(),
            });
        }

        if self.cluster.rack.is_empty() {
            return Err(WardenError::InvalidConfig {
                field: "cluster.rack".to_string(),
                reason: "Rack must be non-empty".to_string(),
            });
        }

        if self.node.instance_id.is_empty() {
            return Err(WardenError::InvalidConfig {
                field: "node.instance_id".to_string(),
                reason: "Instance id must be non-empty".to_string(),
            });
        }

        if self.bootstrap.convergence_threshold_bytes == 0 {
            return Err(WardenError::InvalidConfig {
                field: "bootstrap.convergence_threshold_bytes".to_string(),
                reason: "Convergence threshold must be non-zero".to_string(),
            });
        }

        if self.lock.choosing_ttl >= self.lock.lock_ttl {
            return Err(WardenError::InvalidConfig {
                field: "lock.choosing_ttl".to_string(),
                reason: "Choosing TTL must be shorter than the lock TTL".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration for a single-process run.
    pub fn development() -> Self {
        Self {
            cluster: ClusterConfig {
                name: "demo".to_string(),
                rack: "us-east-1a".to_string(),
                datacenter: "us-east-1".to_string(),
                dual_account: false,
            },
            node: NodeConfig {
                instance_id: "i-dev".to_string(),
                hostname: "localhost".to_string(),
                public_ip: "127.0.0.1".to_string(),
                client_port: 8102,
                peer_port: 8101,
                storage_port: 22122,
            },
            lock: LockConfig::default(),
            identity: IdentityConfig {
                // Keep dev startup fast; production uses the 10-15s window.
                reclaim_jitter_min: Duration::from_millis(10),
                reclaim_jitter_max: Duration::from_millis(20),
                ..IdentityConfig::default()
            },
            bootstrap: BootstrapConfig::default(),
            supervision: SupervisionConfig::default(),
            process: ProcessConfig::default(),
        }
    }
}

/// Cluster-level identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster (app) name. The dead namespace is `{name}-dead`.
    pub name: String,
    /// This node's rack (availability zone).
    pub rack: String,
    /// This node's datacenter (region).
    pub datacenter: String,
    /// When true, ring size adds the cross-account membership size.
    pub dual_account: bool,
}

impl ClusterConfig {
    /// Registry namespace holding decommissioned nodes.
    pub fn dead_namespace(&self) -> String {
        format!("{}-dead", self.name)
    }
}

/// This node's identity as registered in the topology store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Instance id of this machine.
    pub instance_id: String,
    /// Hostname of this machine.
    pub hostname: String,
    /// Public IP of this machine.
    pub public_ip: String,
    /// Client-facing proxy port.
    pub client_port: u16,
    /// Peer-to-peer proxy port.
    pub peer_port: u16,
    /// Local storage engine port, also used to dial peers.
    pub storage_port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            hostname: String::new(),
            public_ip: String::new(),
            client_port: 8102,
            peer_port: 8101,
            storage_port: 22122,
        }
    }
}

/// Advisory lock tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// TTL of the short-lived `choosing` row.
    #[serde(with = "duration_secs")]
    pub choosing_ttl: Duration,
    /// TTL of the long-lived `locking` row. Also the worst-case window a
    /// crashed holder can block a slot.
    #[serde(with = "duration_secs")]
    pub lock_ttl: Duration,
    /// Delay before the confirmation read in acquire step 5.
    #[serde(with = "duration_millis")]
    pub confirm_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            choosing_ttl: Duration::from_secs(6),
            lock_ttl: Duration::from_secs(600),
            confirm_delay: Duration::from_millis(100),
        }
    }
}

/// Identity resolution tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Maximum attempts per resolution step.
    pub max_attempts: u32,
    /// Initial retry delay.
    #[serde(with = "duration_millis")]
    pub retry_initial_delay: Duration,
    /// Maximum retry delay.
    #[serde(with = "duration_millis")]
    pub retry_max_delay: Duration,
    /// Lower bound of the pre-reclamation jitter sleep.
    #[serde(with = "duration_millis")]
    pub reclaim_jitter_min: Duration,
    /// Upper bound of the pre-reclamation jitter sleep.
    #[serde(with = "duration_millis")]
    pub reclaim_jitter_max: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_initial_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
            reclaim_jitter_min: Duration::from_secs(10),
            reclaim_jitter_max: Duration::from_secs(15),
        }
    }
}

/// Warm bootstrap tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Interval between replication offset samples.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Offset gap below which the node counts as caught up.
    pub convergence_threshold_bytes: u64,
    /// Wall-clock budget for one sync attempt.
    #[serde(with = "duration_secs")]
    pub max_duration: Duration,
    /// Consecutive samples of a growing gap before giving up.
    pub max_growth_samples: u32,
    /// Consecutive polling errors before a hard warm-up failure.
    pub max_poll_errors: u32,
    /// Drain sleep between `resuming` and `normal` during cutover.
    #[serde(with = "duration_secs")]
    pub drain_interval: Duration,
    /// Attempts for the post-start proxy responsiveness check.
    pub proxy_ping_attempts: u32,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            convergence_threshold_bytes: 10 * 1024 * 1024,
            max_duration: Duration::from_secs(45 * 60),
            max_growth_samples: 10,
            max_poll_errors: 5,
            drain_interval: Duration::from_secs(15),
            proxy_ping_attempts: 5,
        }
    }
}

/// Supervision loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionConfig {
    /// Interval between supervision ticks.
    #[serde(with = "duration_secs")]
    pub tick_interval: Duration,
    /// Bounded retry count for the storage protocol ping.
    pub storage_ping_attempts: u32,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(15),
            storage_ping_attempts: 3,
        }
    }
}

/// Process controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Command that starts the proxy process.
    pub proxy_start_command: String,
    /// Command that stops the proxy process.
    pub proxy_stop_command: String,
    /// Pid file written by the proxy process.
    pub proxy_pid_file: String,
    /// Pid file written by the storage process.
    pub storage_pid_file: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            proxy_start_command: "/usr/local/bin/proxy-ctl start".to_string(),
            proxy_stop_command: "/usr/local/bin/proxy-ctl stop".to_string(),
            proxy_pid_file: "/var/run/cache-proxy.pid".to_string(),
            storage_pid_file: "/var/run/cache-storage.pid".to_string(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_config_is_valid() {
        WardenConfig::development().validate().unwrap();
    }

    #[test]
    fn rejects_empty_cluster_name() {
        let mut config = WardenConfig::development();
        config.cluster.name.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WardenError::InvalidConfig { ref field, .. } if field == "cluster.name"));
    }

    #[test]
    fn rejects_choosing_ttl_longer_than_lock_ttl() {
        let mut config = WardenConfig::development();
        config.lock.choosing_ttl = Duration::from_secs(700);
        assert!(config.validate().is_err());
    }

    #[test]
    fn dead_namespace_suffix() {
        let config = WardenConfig::development();
        assert_eq!(config.cluster.dead_namespace(), "demo-dead");
    }

    #[test]
    fn config_serde_round_trip() {
        let config = WardenConfig::development();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: WardenConfig = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.cluster.name, "demo");
        assert_eq!(back.lock.confirm_delay, Duration::from_millis(100));
    }
}
