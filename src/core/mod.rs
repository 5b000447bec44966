//! Single-node plumbing: addresses, command builders, framed connections
//! and optional TLS.

pub use crate::proto::error::{Error, Result};

/// Node address parsing.
pub mod address;
/// Command construction and reply helpers.
pub mod command;
/// Framed connection to one node.
pub mod connection;

cfg_if::cfg_if! {
    if #[cfg(feature = "tls")] {
        mod tls;
    }
}
