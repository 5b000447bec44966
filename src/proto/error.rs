use std::io;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a cluster node.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer sent bytes that are not valid RESP, or an unexpected reply.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server answered with an error reply.
    #[error("server error: {message}")]
    Server {
        /// Error text from the server.
        message: String,
    },

    /// AUTH was rejected.
    #[error("authentication failed: {message}")]
    Auth {
        /// Error text from the server.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// TLS setup or handshake failed.
    #[error("TLS error: {message}")]
    Tls {
        /// Description of the failure.
        message: String,
    },

    /// The slot has permanently moved to another node.
    #[error("MOVED to slot {slot} at {address}")]
    Moved {
        /// The slot number (0-16383).
        slot: u16,
        /// The address of the node now owning the slot.
        address: String,
    },

    /// The slot is migrating; retry once on the given node after ASKING.
    #[error("ASK to slot {slot} at {address}")]
    Ask {
        /// The slot number (0-16383).
        slot: u16,
        /// The address of the node importing the slot.
        address: String,
    },

    /// The cluster reported CLUSTERDOWN.
    #[error("CLUSTERDOWN {message}")]
    ClusterDown {
        /// Remainder of the server message.
        message: String,
    },

    /// A keyed command bounced between nodes too many times.
    #[error("too many redirects ({count}) for slot {slot}")]
    TooManyRedirects {
        /// Slot of the key being routed.
        slot: u16,
        /// Number of redirects followed.
        count: usize,
    },
}
