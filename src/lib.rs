//! # muxprobe
//!
//! Single-shot connectivity probe for Redis Cluster endpoints.
//!
//! A probe connects through a list of seed nodes, then runs `PING`,
//! `CLUSTER INFO` and a `SET`/`GET` round trip of a test key, and finally
//! deletes that key. Each step is timed and recorded in a [`Report`]. The
//! `muxprobe` binary renders the report and exits non-zero when any check
//! failed.
//!
//! ## Features
//!
//! - `tls` - TLS via rustls (default)
//! - `json` - serde serialization of reports (default)
//! - `test-utils` - in-memory [`StoreConnector`] for downstream tests
//!
//! ## Example
//!
//! ```no_run
//! use muxprobe::{ClusterEndpointConfig, ProbeRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClusterEndpointConfig::builder()
//!         .seeds_from_str("127.0.0.1:7000,127.0.0.1:7001")
//!         .build()?;
//!     let report = ProbeRunner::cluster().run(&config).await?;
//!     println!("{:?}", report.status());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub(crate) mod proto;

mod cluster;
pub mod probe;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod harness;

pub use crate::cluster::{key_slot, ClusterConnection, ClusterConnector, ClusterInfo, Mode};
pub use crate::core::address::NodeAddress;
pub use crate::core::connection::{ConnectOptions, Credentials};
pub use crate::core::{Error, Result};
pub use crate::probe::{
    ClusterEndpointConfig, ClusterEndpointConfigBuilder, ErrorKind, ProbeError, ProbeRunner,
    Report, ReportStatus, StepName, StepResult, StepStatus, StoreConnection, StoreConnector,
};
