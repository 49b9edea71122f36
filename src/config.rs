//! SwarmKV Configuration
//!
//! Configuration structures for a swarm node and for the CLI client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node-specific configuration
    pub node: NodeIdentityConfig,

    /// Cluster/swarm configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentityConfig {
    /// Address to bind for cluster communication and the HTTP request surface
    pub bind_address: String,
}

/// Cluster/swarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Target number of nodes that should hold any given key upon write
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,

    /// Seed node to join through (host:port). Standalone if unset.
    #[serde(default)]
    pub existing_address: Option<String>,

    /// Heartbeat broadcast interval in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Silence window after which a peer is pruned, in seconds
    #[serde(default = "default_prune_timeout_secs")]
    pub prune_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replication_factor: default_replication_factor(),
            existing_address: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            prune_timeout_secs: default_prune_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Contact node address to bootstrap from
    pub contact_address: String,
}

fn default_replication_factor() -> usize {
    2
}

fn default_heartbeat_interval_ms() -> u64 {
    1000
}

fn default_prune_timeout_secs() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Build a config from just a bind address, with every other field
    /// left at its default. Used when the node is configured entirely
    /// from CLI flags rather than a TOML file.
    pub fn default_with_bind(bind_address: String) -> Self {
        Self {
            node: NodeIdentityConfig { bind_address },
            cluster: ClusterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.bind_address.is_empty() {
            return Err(crate::Error::Config("node.bind_address cannot be empty".into()));
        }
        if self.cluster.replication_factor == 0 {
            return Err(crate::Error::Config("cluster.replication_factor must be >= 1".into()));
        }
        Ok(())
    }

    /// Heartbeat broadcast interval as a Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.cluster.heartbeat_interval_ms)
    }

    /// Prune timeout as a Duration
    pub fn prune_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster.prune_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[node]
bind_address = "127.0.0.1:8765"

[cluster]
replication_factor = 2
existing_address = "127.0.0.1:8001"
"#;

        let config = NodeConfig::from_str(toml).unwrap();
        assert_eq!(config.node.bind_address, "127.0.0.1:8765");
        assert_eq!(config.cluster.replication_factor, 2);
        assert_eq!(config.cluster.existing_address.as_deref(), Some("127.0.0.1:8001"));
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
[node]
bind_address = "127.0.0.1:8765"
"#;
        let config = NodeConfig::from_str(toml).unwrap();
        assert_eq!(config.cluster.replication_factor, 2);
        assert_eq!(config.cluster.prune_timeout_secs, 2);
        assert!(config.cluster.existing_address.is_none());
    }

    #[test]
    fn test_rejects_empty_bind_address() {
        let toml = r#"
[node]
bind_address = ""
"#;
        assert!(NodeConfig::from_str(toml).is_err());
    }
}
