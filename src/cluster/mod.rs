//! # Cluster
//!
//! Redis Cluster support for the probe: slot hashing, topology discovery,
//! redirect handling (MOVED/ASK) and `CLUSTER INFO` parsing.
//!
//! ## Features
//!
//! - **Slot-based routing**: keyed commands go to the master owning the slot
//! - **Topology discovery**: `CLUSTER SLOTS` from the first usable seed
//! - **Redirect handling**: `MOVED` updates the slot map, `ASK` is one-shot
//! - **Standalone fallback**: a seed with cluster support disabled owns all slots
//! - **Hash tags**: `{...}` in a key selects the hashed substring
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> muxprobe::Result<()> {
//! use muxprobe::{key_slot, ClusterConnection, NodeAddress};
//!
//! assert_eq!(key_slot("{user}:a"), key_slot("{user}:b"));
//!
//! let seeds: Vec<NodeAddress> = vec!["127.0.0.1:7000".parse()?];
//! let mut conn = ClusterConnection::connect(&seeds, false, None).await?;
//! println!("{}", conn.cluster_info().await?);
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod errors;
mod info;
mod slot;
mod topology;

pub use client::{ClusterConnection, ClusterConnector, Mode};
pub use errors::parse_redis_error;
pub use info::ClusterInfo;
pub use slot::key_slot;
