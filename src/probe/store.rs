//! The capability surface the probe needs from a store client.
//!
//! [`ProbeRunner`](super::ProbeRunner) is generic over these traits so the
//! step sequence can be exercised against the real cluster client or an
//! in-memory double.

use std::future::Future;

use bytes::Bytes;

use super::config::ClusterEndpointConfig;
use crate::Result;

/// Opens store connections for an endpoint.
pub trait StoreConnector: Send + Sync {
    /// Connection type produced by [`connect`](StoreConnector::connect).
    type Connection: StoreConnection;

    /// Establishes a cluster-aware connection from the configured seeds.
    fn connect(
        &self,
        config: &ClusterEndpointConfig,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An open, exclusively owned store connection.
pub trait StoreConnection: Send {
    /// Short description of what was connected to, used as the connect detail.
    fn describe(&self) -> String;

    /// Sends `PING` and returns the reply text.
    fn ping(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Sends `CLUSTER INFO` and returns the raw reply text.
    fn cluster_info(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// `SET key value`
    fn set(&mut self, key: &str, value: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// `GET key`
    fn get(&mut self, key: &str) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// `DEL key`; returns whether the key existed.
    fn del(&mut self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Releases every underlying socket.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}
