//! Cluster connection used by the probe.
//!
//! Holds one framed connection per node it has talked to, routes keyed
//! commands by hash slot and follows `MOVED` / `ASK` redirects.

use std::collections::HashMap;
use std::io;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::slot::key_slot;
use super::topology::SlotMap;
use crate::core::address::NodeAddress;
use crate::core::command::{self, Cmd};
use crate::core::connection::{dial, ConnectOptions, Connection, Credentials, NodeStream};
use crate::probe::{ClusterEndpointConfig, StoreConnection, StoreConnector};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Redirects followed for a single command before giving up.
const MAX_REDIRECTS: usize = 5;

/// How slot ownership was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `CLUSTER SLOTS` answered.
    Cluster,
    /// The seed has cluster support disabled and owns every slot.
    Standalone,
}

/// Connection to a cluster, bootstrapped from a list of seeds.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> muxprobe::Result<()> {
/// use bytes::Bytes;
/// use muxprobe::{ClusterConnection, NodeAddress};
///
/// let seeds = ["127.0.0.1:7000".parse::<NodeAddress>()?];
/// let mut conn = ClusterConnection::connect(&seeds, false, None).await?;
/// conn.set("test:hello", Bytes::from("Redis Cluster Works!")).await?;
/// assert!(conn.get("test:hello").await?.is_some());
/// conn.del("test:hello").await?;
/// conn.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ClusterConnection {
    primary: NodeAddress,
    mode: Mode,
    slots: SlotMap,
    nodes: HashMap<NodeAddress, Connection<NodeStream>>,
    options: ConnectOptions,
}

impl ClusterConnection {
    /// Connects to the first seed that accepts a connection, authenticates
    /// and answers topology discovery.
    ///
    /// # Errors
    ///
    /// Returns the last seed's error if no seed is usable, or
    /// [`Error::InvalidArgument`] if `seeds` is empty.
    pub async fn connect(
        seeds: &[NodeAddress],
        tls: bool,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let options = ConnectOptions {
            tls,
            credentials,
            ..ConnectOptions::default()
        };
        Self::connect_with(seeds, options).await
    }

    /// Like [`connect`](Self::connect), with full control over how nodes are
    /// dialed.
    ///
    /// With [`ConnectOptions::seed_timeout`] set, a seed that does not finish
    /// bootstrapping in time fails with a timed-out [`Error::Io`] and the
    /// next seed is tried.
    pub async fn connect_with(seeds: &[NodeAddress], options: ConnectOptions) -> Result<Self> {
        let mut last_error = None;

        for seed in seeds {
            let attempt = match options.seed_timeout {
                Some(limit) => tokio::time::timeout(limit, bootstrap(seed, &options))
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::Io {
                            source: io::Error::new(
                                io::ErrorKind::TimedOut,
                                format!("{seed} did not answer within {}ms", limit.as_millis()),
                            ),
                        })
                    }),
                None => bootstrap(seed, &options).await,
            };
            match attempt {
                Ok((conn, slots, mode)) => {
                    info!(seed = %seed, ?mode, masters = slots.master_count(), "connected");
                    let mut nodes = HashMap::new();
                    nodes.insert(seed.clone(), conn);
                    return Ok(Self {
                        primary: seed.clone(),
                        mode,
                        slots,
                        nodes,
                        options,
                    });
                }
                Err(e) => {
                    warn!(seed = %seed, error = %e, "seed unusable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::InvalidArgument {
            message: "no seed addresses provided".to_string(),
        }))
    }

    /// The seed that answered bootstrap; non-keyed commands go here.
    pub fn primary(&self) -> &NodeAddress {
        &self.primary
    }

    /// How slot ownership was discovered.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of masters in the discovered slot map.
    pub fn master_count(&self) -> usize {
        self.slots.master_count()
    }

    /// Number of slots the discovered map covers.
    pub fn covered_slots(&self) -> usize {
        self.slots.covered_slots()
    }

    /// Number of nodes with an open connection.
    pub fn open_connections(&self) -> usize {
        self.nodes.len()
    }

    /// Sends `PING` to the primary node.
    pub async fn ping(&mut self) -> Result<Bytes> {
        let frame = self.primary_request(command::ping()).await?;
        command::expect_status(frame)
    }

    /// Sends `CLUSTER INFO` to the primary node.
    pub async fn cluster_info(&mut self) -> Result<String> {
        let frame = self.primary_request(command::cluster_info()).await?;
        let text = command::expect_bulk(frame)?.unwrap_or_default();
        Ok(String::from_utf8_lossy(&text).into_owned())
    }

    /// `SET key value` on the node owning the key's slot.
    pub async fn set(&mut self, key: &str, value: Bytes) -> Result<()> {
        let frame = self
            .keyed_request(key, command::set(key.to_string(), value))
            .await?;
        command::expect_status(frame).map(|_| ())
    }

    /// `GET key` on the node owning the key's slot.
    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        let frame = self
            .keyed_request(key, command::get(key.to_string()))
            .await?;
        command::expect_bulk(frame)
    }

    /// `DEL key` on the node owning the key's slot; returns the number of
    /// keys removed.
    pub async fn del(&mut self, key: &str) -> Result<i64> {
        let frame = self
            .keyed_request(key, command::del(key.to_string()))
            .await?;
        command::expect_integer(frame)
    }

    /// Shuts down every node connection.
    pub async fn close(mut self) {
        for (_, mut conn) in self.nodes.drain() {
            conn.shutdown().await;
            debug!(node = %conn.address(), "closed");
        }
    }

    async fn primary_request(&mut self, cmd: Cmd) -> Result<Frame> {
        let primary = self.primary.clone();
        self.node(&primary).await?.request(cmd).await
    }

    async fn keyed_request(&mut self, key: &str, cmd: Cmd) -> Result<Frame> {
        let slot = key_slot(key);
        let mut target = self
            .slots
            .owner(slot)
            .cloned()
            .ok_or_else(|| Error::ClusterDown {
                message: format!("no node serves slot {slot}"),
            })?;
        let mut asking = false;
        let mut redirects = 0;

        loop {
            let conn = self.node(&target).await?;
            if asking {
                conn.request(command::asking()).await?;
            }
            let result = conn.request(cmd.clone()).await;

            let (address, moved) = match result {
                Err(Error::Moved { address, .. }) => (address, true),
                Err(Error::Ask { address, .. }) => (address, false),
                other => return other,
            };
            if redirects == MAX_REDIRECTS {
                return Err(Error::TooManyRedirects {
                    slot,
                    count: redirects,
                });
            }
            redirects += 1;

            let address = redirect_target(&address, &target)?;
            debug!(slot, to = %address, moved, "redirected");
            if moved {
                self.slots.reassign(slot, address.clone());
            }
            asking = !moved;
            target = address;
        }
    }

    /// Returns a usable connection to `address`, dialing it if needed.
    ///
    /// A connection left waiting on a reply by an abandoned request is
    /// replaced, since its next read would return the stale reply.
    async fn node(&mut self, address: &NodeAddress) -> Result<&mut Connection<NodeStream>> {
        if self.nodes.get(address).is_some_and(Connection::is_desynced) {
            warn!(node = %address, "discarding connection with an unanswered request");
            self.nodes.remove(address);
        }
        if !self.nodes.contains_key(address) {
            let conn = dial(address, &self.options).await?;
            self.nodes.insert(address.clone(), conn);
        }
        self.nodes.get_mut(address).ok_or_else(|| Error::Protocol {
            message: format!("connection to {address} unavailable"),
        })
    }
}

/// Resolves a redirect address of the form `host:port`. The port follows the
/// last colon, so unbracketed IPv6 hosts work. An empty host means the node
/// that sent the redirect.
fn redirect_target(address: &str, from: &NodeAddress) -> Result<NodeAddress> {
    if address.starts_with('[') {
        return address.parse();
    }
    let invalid = || Error::Protocol {
        message: format!("invalid redirect address {address:?}"),
    };
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(invalid)?;
    let host = if host.is_empty() { from.host() } else { host };
    Ok(NodeAddress::new(host, port))
}

async fn bootstrap(
    seed: &NodeAddress,
    options: &ConnectOptions,
) -> Result<(Connection<NodeStream>, SlotMap, Mode)> {
    let mut conn = dial(seed, options).await?;
    match conn.request(command::cluster_slots()).await {
        Ok(frame) => {
            let slots = SlotMap::from_cluster_slots(&frame, seed)?;
            Ok((conn, slots, Mode::Cluster))
        }
        Err(Error::Server { message }) if message.contains("cluster support disabled") => {
            Ok((conn, SlotMap::standalone(seed.clone()), Mode::Standalone))
        }
        Err(e) => Err(e),
    }
}

/// [`StoreConnector`] backed by [`ClusterConnection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterConnector;

impl StoreConnector for ClusterConnector {
    type Connection = ClusterConnection;

    async fn connect(&self, config: &ClusterEndpointConfig) -> Result<ClusterConnection> {
        ClusterConnection::connect_with(config.seeds(), config.connect_options()).await
    }
}

impl StoreConnection for ClusterConnection {
    fn describe(&self) -> String {
        match self.mode {
            Mode::Cluster => format!(
                "connected via {} ({} masters, {} slots covered)",
                self.primary,
                self.master_count(),
                self.covered_slots()
            ),
            Mode::Standalone => format!("connected to {} (cluster mode disabled)", self.primary),
        }
    }

    async fn ping(&mut self) -> Result<String> {
        let reply = ClusterConnection::ping(self).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    async fn cluster_info(&mut self) -> Result<String> {
        ClusterConnection::cluster_info(self).await
    }

    async fn set(&mut self, key: &str, value: Bytes) -> Result<()> {
        ClusterConnection::set(self, key, value).await
    }

    async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        ClusterConnection::get(self, key).await
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        Ok(ClusterConnection::del(self, key).await? > 0)
    }

    async fn close(self) {
        ClusterConnection::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::harness::{FakeNode, FakeNodeOptions};

    #[test]
    fn test_redirect_target() {
        let from = NodeAddress::new("10.0.0.1", 7000);
        assert_eq!(
            redirect_target("10.0.0.2:7001", &from).unwrap(),
            NodeAddress::new("10.0.0.2", 7001)
        );
        assert_eq!(
            redirect_target(":7002", &from).unwrap(),
            NodeAddress::new("10.0.0.1", 7002)
        );
        assert!(redirect_target(":x", &from).is_err());
        assert!(redirect_target("7001", &from).is_err());
        assert!(redirect_target("10.0.0.2:0", &from).is_err());
    }

    #[test]
    fn test_redirect_target_ipv6() {
        let from = NodeAddress::new("10.0.0.1", 7000);
        assert_eq!(
            redirect_target("::1:7001", &from).unwrap(),
            NodeAddress::new("::1", 7001)
        );
        assert_eq!(
            redirect_target("[::1]:7001", &from).unwrap(),
            NodeAddress::new("::1", 7001)
        );
        assert_eq!(
            redirect_target("fe80::1:2:6380", &from).unwrap(),
            NodeAddress::new("fe80::1:2", 6380)
        );
    }

    #[tokio::test]
    async fn test_connect_discovers_slots() {
        let node = FakeNode::spawn(FakeNodeOptions::default()).await;
        let conn = ClusterConnection::connect(&[node.address()], false, None)
            .await
            .unwrap();

        assert_eq!(conn.mode(), Mode::Cluster);
        assert_eq!(conn.master_count(), 1);
        assert_eq!(conn.covered_slots(), 16384);
        assert!(conn.describe().contains("1 masters"));
        conn.close().await;
    }

    #[tokio::test]
    async fn test_round_trip_and_cleanup() {
        let node = FakeNode::spawn(FakeNodeOptions::default()).await;
        let mut conn = ClusterConnection::connect(&[node.address()], false, None)
            .await
            .unwrap();

        assert_eq!(ClusterConnection::ping(&mut conn).await.unwrap(), "PONG");
        assert!(ClusterConnection::cluster_info(&mut conn)
            .await
            .unwrap()
            .contains("cluster_state:ok"));

        conn.set("test:hello", Bytes::from("Redis Cluster Works!"))
            .await
            .unwrap();
        assert_eq!(
            conn.get("test:hello").await.unwrap(),
            Some(Bytes::from("Redis Cluster Works!"))
        );
        assert_eq!(conn.del("test:hello").await.unwrap(), 1);
        assert_eq!(conn.del("test:hello").await.unwrap(), 0);
        conn.close().await;

        assert!(node.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_seed_falls_through_to_next() {
        let dead = FakeNode::unused_address().await;
        let node = FakeNode::spawn(FakeNodeOptions::default()).await;

        let conn = ClusterConnection::connect(&[dead, node.address()], false, None)
            .await
            .unwrap();
        assert_eq!(conn.primary(), &node.address());
        conn.close().await;
    }

    #[tokio::test]
    async fn test_silent_seed_times_out_and_next_is_tried() {
        let silent = FakeNode::silent_address().await;
        let node = FakeNode::spawn(FakeNodeOptions::default()).await;
        let options = ConnectOptions {
            seed_timeout: Some(Duration::from_millis(100)),
            ..ConnectOptions::default()
        };

        let conn = ClusterConnection::connect_with(&[silent, node.address()], options)
            .await
            .unwrap();
        assert_eq!(conn.primary(), &node.address());
        conn.close().await;
    }

    #[tokio::test]
    async fn test_silent_seed_alone_reports_timeout() {
        let silent = FakeNode::silent_address().await;
        let options = ConnectOptions {
            seed_timeout: Some(Duration::from_millis(50)),
            ..ConnectOptions::default()
        };

        let err = ClusterConnection::connect_with(&[silent], options)
            .await
            .unwrap_err();
        match err {
            Error::Io { source } => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_reachable_seed() {
        let dead = FakeNode::unused_address().await;
        let err = ClusterConnection::connect(&[dead], false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));

        let err = ClusterConnection::connect(&[], false, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_follows_moved_redirect() {
        let owner = FakeNode::spawn(FakeNodeOptions::default()).await;
        let stale = FakeNode::spawn(FakeNodeOptions {
            redirect_to: Some(owner.address()),
            ..FakeNodeOptions::default()
        })
        .await;

        let mut conn = ClusterConnection::connect(&[stale.address()], false, None)
            .await
            .unwrap();
        conn.set("test:hello", Bytes::from("v")).await.unwrap();

        assert_eq!(owner.keys(), vec!["test:hello".to_string()]);
        assert!(stale.keys().is_empty());
        assert_eq!(conn.open_connections(), 2);

        assert_eq!(conn.del("test:hello").await.unwrap(), 1);
        conn.close().await;
        assert!(owner.keys().is_empty());
    }

    #[tokio::test]
    async fn test_follows_ask_redirect_without_remapping() {
        let target = FakeNode::spawn(FakeNodeOptions::default()).await;
        let source = FakeNode::spawn(FakeNodeOptions {
            ask_to: Some(target.address()),
            ..FakeNodeOptions::default()
        })
        .await;

        let mut conn = ClusterConnection::connect(&[source.address()], false, None)
            .await
            .unwrap();
        conn.set("test:hello", Bytes::from("v")).await.unwrap();

        assert_eq!(target.keys(), vec!["test:hello".to_string()]);
        assert!(source.keys().is_empty());

        let seen = target.commands();
        assert_eq!(&seen[seen.len() - 2..], ["ASKING", "SET"]);
        assert_eq!(
            conn.slots.owner(key_slot("test:hello")),
            Some(&source.address())
        );

        // The migrating slot is asked again, still via the source.
        assert_eq!(
            conn.get("test:hello").await.unwrap(),
            Some(Bytes::from("v"))
        );
        let seen = target.commands();
        assert_eq!(&seen[seen.len() - 2..], ["ASKING", "GET"]);
        conn.close().await;
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let node = FakeNode::spawn_self_redirecting().await;
        let mut conn = ClusterConnection::connect(&[node.address()], false, None)
            .await
            .unwrap();

        let err = conn.get("test:hello").await.unwrap_err();
        assert!(matches!(err, Error::TooManyRedirects { count: 5, .. }));
        conn.close().await;
    }

    #[tokio::test]
    async fn test_standalone_fallback() {
        let node = FakeNode::spawn(FakeNodeOptions {
            cluster_disabled: true,
            ..FakeNodeOptions::default()
        })
        .await;
        let mut conn = ClusterConnection::connect(&[node.address()], false, None)
            .await
            .unwrap();

        assert_eq!(conn.mode(), Mode::Standalone);
        assert!(ClusterConnection::cluster_info(&mut conn).await.is_err());
        conn.set("k", Bytes::from("v")).await.unwrap();
        assert_eq!(conn.get("k").await.unwrap(), Some(Bytes::from("v")));
        conn.close().await;
    }

    #[tokio::test]
    async fn test_auth() {
        let node = FakeNode::spawn(FakeNodeOptions {
            password: Some("secret".to_string()),
            ..FakeNodeOptions::default()
        })
        .await;

        let wrong = Credentials {
            username: None,
            password: "nope".to_string(),
        };
        let err = ClusterConnection::connect(&[node.address()], false, Some(wrong))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));

        let right = Credentials {
            username: None,
            password: "secret".to_string(),
        };
        let conn = ClusterConnection::connect(&[node.address()], false, Some(right))
            .await
            .unwrap();
        conn.close().await;
    }

    #[tokio::test]
    async fn test_desynced_connection_is_redialed() {
        let node = FakeNode::spawn(FakeNodeOptions {
            ping_delay: Some(std::time::Duration::from_millis(200)),
            ..FakeNodeOptions::default()
        })
        .await;
        let mut conn = ClusterConnection::connect(&[node.address()], false, None)
            .await
            .unwrap();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            ClusterConnection::ping(&mut conn),
        )
        .await;
        assert!(abandoned.is_err());

        // The late PONG must not be taken as the DEL reply.
        assert_eq!(conn.del("test:hello").await.unwrap(), 0);
        assert_eq!(node.connections_accepted(), 2);
        conn.close().await;
    }
}
