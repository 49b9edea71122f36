//! SwarmKV - Gossip-Replicated In-Memory Key-Value Swarm
//!
//! A small distributed key-value store where every node is a peer: nodes
//! discover each other by joining through any existing member, exchange
//! liveness and load via periodic heartbeats, and prune peers that go
//! silent. Clients write and read through whichever replicas currently
//! hold (or should hold) a key, chosen by the least-loaded members of
//! the swarm.
//!
//! # Architecture
//!
//! There is no leader and no consensus round: membership is eventually
//! consistent, propagated by gossip piggybacked on heartbeats. Clients
//! are responsible for fan-out and for accepting that a network
//! partition can produce temporarily divergent answers.
//!
//! # Features
//!
//! - In-memory per-node record store keyed by UUID
//! - Swarm membership with heartbeat-based liveness and timeout pruning
//! - JSON-over-HTTP request surface (`/view`, `/heartbeat`, `/find`,
//!   `/get`, `/set`, `/delete`)
//! - Replication-factor-aware client fan-out for writes and deletes

pub mod api;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod store;
pub mod swarm;

pub use config::{ClientConfig, NodeConfig};
pub use error::{Error, Result};

/// Re-export of the commonly used types.
pub mod prelude {
    pub use crate::api::{AppState, HeartbeatRequest, HttpServer, RecordCommand, RecordValue, ViewRequest};
    pub use crate::config::{ClientConfig, NodeConfig};
    pub use crate::error::{Error, Result};
    pub use crate::heartbeat::HeartbeatEngine;
    pub use crate::store::{RecordStore, RemoveOutcome, UpsertOutcome};
    pub use crate::swarm::{PeerInfo, Swarm, SwarmView};
}
