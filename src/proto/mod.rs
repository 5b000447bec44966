//! RESP2 wire format used to talk to cluster nodes.
//!
//! - [`frame`] - In-memory representation of protocol values
//! - [`codec`] - Encoder and incremental decoder
//! - [`error`] - Error type shared by the whole client stack

pub mod codec;
pub mod error;
pub mod frame;
