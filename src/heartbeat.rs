//! Heartbeat Engine
//!
//! Two independent loops per node: a broadcaster that pushes this node's
//! identity to every known peer and merges back whatever view the peer
//! returns, and a pruner that drops peers silent for too long.

use std::sync::Arc;
use std::time::Duration;

use crate::api::HeartbeatRequest;
use crate::store::RecordStore;
use crate::swarm::{PeerInfo, Swarm};

/// Periodic broadcaster + pruner for one node.
pub struct HeartbeatEngine {
    swarm: Arc<Swarm>,
    store: Arc<RecordStore>,
    http: reqwest::Client,
    heartbeat_interval: Duration,
    prune_timeout: Duration,
}

impl HeartbeatEngine {
    pub fn new(
        swarm: Arc<Swarm>,
        store: Arc<RecordStore>,
        heartbeat_interval: Duration,
        prune_timeout: Duration,
    ) -> Self {
        Self {
            swarm,
            store,
            http: reqwest::Client::new(),
            heartbeat_interval,
            prune_timeout,
        }
    }

    /// Run the broadcaster loop forever: once per tick, fan out a
    /// heartbeat to every peer other than self, wait for all of them,
    /// then sleep. A peer that fails to answer is logged and left alone;
    /// pruning is the only path that removes a peer.
    pub async fn run_broadcaster(&self) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;

            let records_count = self.store.records_count().await;
            self.swarm.set_own_records_count(records_count).await;
            let this_node_address = self.swarm.this_node_address().to_string();
            let peers = self.swarm.peers().await;

            let sends = peers.into_iter().map(|peer| {
                let http = self.http.clone();
                let this_node_address = this_node_address.clone();
                async move {
                    send_heartbeat(&http, &peer.address, &this_node_address, records_count).await
                }
            });

            let results = futures::future::join_all(sends).await;
            for result in results {
                match result {
                    Ok(view) => {
                        // Gossiped peers only ever get learned, never
                        // liveness-refreshed: a peer's own last_heartbeat
                        // is only trustworthy from a direct heartbeat or
                        // view report (api/http.rs), not from being
                        // mentioned in someone else's view.
                        for (addr, info) in view.nodes {
                            if addr == this_node_address {
                                continue;
                            }
                            self.swarm.learn(info).await;
                        }
                    }
                    Err((address, reason)) => {
                        tracing::warn!("heartbeat to {address} failed: {reason}");
                    }
                }
            }
        }
    }

    /// Run the pruner loop forever: once per `prune_timeout`, drop any
    /// peer (other than self) silent for longer than `prune_timeout`.
    pub async fn run_pruner(&self) {
        let mut ticker = tokio::time::interval(self.prune_timeout);
        loop {
            ticker.tick().await;
            let pruned = self.swarm.prune(self.prune_timeout).await;
            for address in pruned {
                tracing::info!("pruned silent peer {address}");
            }
        }
    }
}

async fn send_heartbeat(
    http: &reqwest::Client,
    peer_address: &str,
    this_node_address: &str,
    records_count: usize,
) -> Result<crate::swarm::SwarmView, (String, String)> {
    let url = format!("http://{peer_address}/heartbeat");
    let body = HeartbeatRequest {
        address: this_node_address.to_string(),
        records_count,
    };
    let response = http
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| (peer_address.to_string(), e.to_string()))?;
    response
        .json::<crate::swarm::SwarmView>()
        .await
        .map_err(|e| (peer_address.to_string(), e.to_string()))
}

/// Send a single view request, used for bootstrap/join and for the
/// client's refresh loop. Not part of the per-node broadcaster.
pub async fn request_view(
    http: &reqwest::Client,
    address: &str,
    this_node: Option<PeerInfo>,
) -> crate::error::Result<crate::swarm::SwarmView> {
    let url = format!("http://{address}/view");
    let response = http
        .post(&url)
        .json(&crate::api::ViewRequest { node: this_node })
        .send()
        .await?;
    Ok(response.json::<crate::swarm::SwarmView>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcaster_ticks_without_peers() {
        let swarm = Arc::new(Swarm::standalone("127.0.0.1:8999".into(), 2));
        let store = Arc::new(RecordStore::new());
        let engine = HeartbeatEngine::new(
            Arc::clone(&swarm),
            Arc::clone(&store),
            Duration::from_millis(5),
            Duration::from_secs(2),
        );
        // No peers means join_all resolves over an empty iterator; this
        // must not hang or panic.
        tokio::time::timeout(Duration::from_millis(50), async {
            tokio::select! {
                _ = engine.run_broadcaster() => {}
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
        })
        .await
        .unwrap();
    }
}
