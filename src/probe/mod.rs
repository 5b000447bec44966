//! # Probe
//!
//! The connectivity probe: configuration, the step sequence, and the report
//! it produces.
//!
//! [`ProbeRunner::run`] executes `connect`, `ping`, `cluster_info`,
//! `write_read` and `cleanup` in that order. The first failing step causes
//! the remaining checks to be skipped, but once a connection was opened the
//! test key is always deleted and the connection closed. Rendering the
//! [`Report`] is left to the caller.

mod config;
mod error;
mod report;
mod runner;
mod step;
mod store;

pub use config::{
    ClusterEndpointConfig, ClusterEndpointConfigBuilder, DEFAULT_TEST_KEY, DEFAULT_TEST_VALUE,
};
pub use error::{ErrorKind, ProbeError};
pub use report::{Report, ReportStatus};
pub use runner::ProbeRunner;
pub use step::{StepName, StepResult, StepStatus};
pub use store::{StoreConnection, StoreConnector};
