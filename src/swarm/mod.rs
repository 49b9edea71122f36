//! Swarm Membership
//!
//! Tracks the set of known peer nodes and the replication factor shared
//! by the whole swarm.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Wire-visible identity of a node: only what is safe to ship to peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
    pub records_count: usize,
}

/// Locally observed state of one known peer, including this node itself.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub records_count: usize,
    pub last_heartbeat: Instant,
}

/// A snapshot of the swarm suitable for wire encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmView {
    pub node: PeerInfo,
    pub nodes: HashMap<String, PeerInfo>,
    pub replication_factor: usize,
}

/// The swarm membership map held by every node.
///
/// `nodes[this_node_address]` is always present (invariant 2); there is a
/// single `HashMap<String, PeerEntry>` keyed by address, not a separate
/// owned copy of `this_node`, so the two can never drift apart.
pub struct Swarm {
    this_node_address: String,
    nodes: RwLock<HashMap<String, PeerEntry>>,
    replication_factor: usize,
}

impl Swarm {
    /// Start a standalone swarm: `nodes = { this_node }`.
    pub fn standalone(this_node_address: String, replication_factor: usize) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            this_node_address.clone(),
            PeerEntry {
                records_count: 0,
                last_heartbeat: Instant::now(),
            },
        );
        Self {
            this_node_address,
            nodes: RwLock::new(nodes),
            replication_factor,
        }
    }

    /// Start a swarm by adopting the membership map returned from a seed's
    /// view response. `this_node` is re-asserted into the adopted map.
    pub fn from_seed_view(this_node_address: String, seed_view: SwarmView) -> Self {
        let mut nodes: HashMap<String, PeerEntry> = seed_view
            .nodes
            .into_values()
            .map(|peer| {
                (
                    peer.address,
                    PeerEntry {
                        records_count: peer.records_count,
                        last_heartbeat: Instant::now(),
                    },
                )
            })
            .collect();
        nodes.entry(this_node_address.clone()).or_insert(PeerEntry {
            records_count: 0,
            last_heartbeat: Instant::now(),
        });
        Self {
            this_node_address,
            nodes: RwLock::new(nodes),
            replication_factor: seed_view.replication_factor,
        }
    }

    pub fn this_node_address(&self) -> &str {
        &self.this_node_address
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Atomically insert or overwrite `nodes[peer.address]` and stamp
    /// `last_heartbeat := now()`.
    pub async fn ingest(&self, peer: PeerInfo) {
        let mut nodes = self.nodes.write().await;
        nodes.insert(
            peer.address,
            PeerEntry {
                records_count: peer.records_count,
                last_heartbeat: Instant::now(),
            },
        );
    }

    /// Insert `peer` only if its address is not already known. Never
    /// refreshes an existing entry's `last_heartbeat` or `records_count` -
    /// this is the gossip-learn path, not a liveness signal. Direct
    /// `/heartbeat` and `/view` reports must keep calling `ingest` instead.
    pub async fn learn(&self, peer: PeerInfo) {
        let mut nodes = self.nodes.write().await;
        nodes.entry(peer.address).or_insert_with(|| PeerEntry {
            records_count: peer.records_count,
            last_heartbeat: Instant::now(),
        });
    }

    /// Update the locally observed `records_count` for this node without
    /// disturbing its `last_heartbeat`.
    pub async fn set_own_records_count(&self, records_count: usize) {
        let mut nodes = self.nodes.write().await;
        if let Some(entry) = nodes.get_mut(&self.this_node_address) {
            entry.records_count = records_count;
        }
    }

    /// Remove any peer (other than `this_node`) whose `last_heartbeat` is
    /// older than `timeout`. Returns the pruned addresses.
    pub async fn prune(&self, timeout: Duration) -> Vec<String> {
        let mut nodes = self.nodes.write().await;
        let this_node = self.this_node_address.clone();
        let stale: Vec<String> = nodes
            .iter()
            .filter(|(addr, entry)| {
                **addr != this_node && entry.last_heartbeat.elapsed() > timeout
            })
            .map(|(addr, _)| addr.clone())
            .collect();
        for addr in &stale {
            nodes.remove(addr);
        }
        stale
    }

    /// Snapshot of current `nodes` for response encoding or broadcast.
    pub async fn view(&self) -> SwarmView {
        let nodes = self.nodes.read().await;
        let this_entry = nodes
            .get(&self.this_node_address)
            .expect("this_node must always be present in nodes");
        let node = PeerInfo {
            address: self.this_node_address.clone(),
            records_count: this_entry.records_count,
        };
        let peer_map = nodes
            .iter()
            .map(|(addr, entry)| {
                (
                    addr.clone(),
                    PeerInfo {
                        address: addr.clone(),
                        records_count: entry.records_count,
                    },
                )
            })
            .collect();
        SwarmView {
            node,
            nodes: peer_map,
            replication_factor: self.replication_factor,
        }
    }

    /// All known peers excluding this node, in map-enumeration order.
    pub async fn peers(&self) -> Vec<PeerInfo> {
        let nodes = self.nodes.read().await;
        nodes
            .iter()
            .filter(|(addr, _)| **addr != self.this_node_address)
            .map(|(addr, entry)| PeerInfo {
                address: addr.clone(),
                records_count: entry.records_count,
            })
            .collect()
    }

    pub async fn size(&self) -> usize {
        self.nodes.read().await.len()
    }
}

/// Parse a `host:port` address, rejecting anything that wouldn't resolve
/// to a single endpoint. Used to validate CLI flags before a node starts.
pub fn validate_address(address: &str) -> Result<()> {
    let parts: Vec<&str> = address.rsplitn(2, ':').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::Config(format!("invalid address: {address}")));
    }
    match parts[0].parse::<u16>() {
        Ok(p) if p >= 1 => Ok(()),
        _ => Err(Error::Config(format!(
            "invalid port in address: {address}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn standalone_contains_only_self() {
        let swarm = Swarm::standalone("127.0.0.1:8765".into(), 2);
        assert_eq!(swarm.size().await, 1);
        assert!(swarm.peers().await.is_empty());
    }

    #[tokio::test]
    async fn ingest_adds_and_updates_peer() {
        let swarm = Swarm::standalone("127.0.0.1:8001".into(), 2);
        swarm
            .ingest(PeerInfo {
                address: "127.0.0.1:8002".into(),
                records_count: 3,
            })
            .await;
        assert_eq!(swarm.size().await, 2);
        let peers = swarm.peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].records_count, 3);

        swarm
            .ingest(PeerInfo {
                address: "127.0.0.1:8002".into(),
                records_count: 7,
            })
            .await;
        assert_eq!(swarm.size().await, 2);
        assert_eq!(swarm.peers().await[0].records_count, 7);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_non_self_peers() {
        let swarm = Swarm::standalone("127.0.0.1:8001".into(), 2);
        swarm
            .ingest(PeerInfo {
                address: "127.0.0.1:8002".into(),
                records_count: 0,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let pruned = swarm.prune(Duration::from_millis(10)).await;
        assert_eq!(pruned, vec!["127.0.0.1:8002".to_string()]);
        assert_eq!(swarm.size().await, 1);
    }

    #[tokio::test]
    async fn prune_never_removes_self() {
        let swarm = Swarm::standalone("127.0.0.1:8001".into(), 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let pruned = swarm.prune(Duration::from_millis(10)).await;
        assert!(pruned.is_empty());
        assert_eq!(swarm.size().await, 1);
    }

    #[tokio::test]
    async fn from_seed_view_reasserts_self() {
        let mut nodes = HashMap::new();
        nodes.insert(
            "127.0.0.1:8001".to_string(),
            PeerInfo {
                address: "127.0.0.1:8001".into(),
                records_count: 5,
            },
        );
        let seed_view = SwarmView {
            node: nodes["127.0.0.1:8001"].clone(),
            nodes,
            replication_factor: 3,
        };
        let swarm = Swarm::from_seed_view("127.0.0.1:8002".into(), seed_view);
        assert_eq!(swarm.size().await, 2);
        assert_eq!(swarm.replication_factor(), 3);
    }

    #[tokio::test]
    async fn learn_adds_new_peer_but_never_refreshes_known_one() {
        let swarm = Swarm::standalone("127.0.0.1:8001".into(), 2);
        swarm
            .ingest(PeerInfo {
                address: "127.0.0.1:8002".into(),
                records_count: 1,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Known peer: learn must not touch records_count or last_heartbeat.
        swarm
            .learn(PeerInfo {
                address: "127.0.0.1:8002".into(),
                records_count: 99,
            })
            .await;
        assert_eq!(swarm.peers().await.iter().find(|p| p.address == "127.0.0.1:8002").unwrap().records_count, 1);
        let pruned = swarm.prune(Duration::from_millis(10)).await;
        assert_eq!(pruned, vec!["127.0.0.1:8002".to_string()]);

        // Brand-new peer: learn must add it.
        swarm
            .learn(PeerInfo {
                address: "127.0.0.1:8003".into(),
                records_count: 4,
            })
            .await;
        assert_eq!(swarm.size().await, 2);
        assert!(swarm.peers().await.iter().any(|p| p.address == "127.0.0.1:8003"));
    }

    #[test]
    fn validate_address_accepts_host_port() {
        assert!(validate_address("127.0.0.1:8765").is_ok());
        assert!(validate_address("localhost:1").is_ok());
    }

    #[test]
    fn validate_address_rejects_malformed() {
        assert!(validate_address("no-port").is_err());
        assert!(validate_address(":8765").is_err());
        assert!(validate_address("host:").is_err());
        assert!(validate_address("host:abc").is_err());
        assert!(validate_address("host:0").is_err());
    }
}
