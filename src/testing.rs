//! Test doubles for code built on the probe.
//!
//! [`MockConnector`] is an in-memory store that implements
//! [`StoreConnector`] with scripted failures and delays, and counts how many
//! connections were opened and closed.
//!
//! ```ignore
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use muxprobe::testing::{MockConnector, MockOp};
//! use muxprobe::{ClusterEndpointConfig, ProbeRunner, StepName, StepStatus};
//!
//! let mock = MockConnector::new().fail(MockOp::ClusterInfo, "CLUSTERDOWN The cluster is down");
//! let config = ClusterEndpointConfig::builder()
//!     .seeds_from_str("127.0.0.1:7000")
//!     .build()
//!     .unwrap();
//!
//! let report = ProbeRunner::new(mock.clone()).run(&config).await.unwrap();
//! assert!(!report.is_ok());
//! assert_eq!(report.step(StepName::Cleanup).unwrap().status(), StepStatus::Ok);
//! assert_eq!(mock.closed(), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::probe::{ClusterEndpointConfig, StoreConnection, StoreConnector};
use crate::{Error, Result};

const CLUSTER_INFO: &str = "cluster_state:ok\r\n\
    cluster_slots_assigned:16384\r\n\
    cluster_slots_ok:16384\r\n\
    cluster_known_nodes:6\r\n\
    cluster_size:3\r\n";

/// Store operations a [`MockConnector`] can script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// Opening a connection.
    Connect,
    /// `PING`
    Ping,
    /// `CLUSTER INFO`
    ClusterInfo,
    /// `SET`
    Set,
    /// `GET`
    Get,
    /// `DEL`
    Del,
}

#[derive(Debug, Default)]
struct MockState {
    data: HashMap<String, Bytes>,
    failures: HashMap<MockOp, String>,
    delays: HashMap<MockOp, Duration>,
    cluster_info: Option<String>,
    corrupt_reads: bool,
    calls: Vec<MockOp>,
    opened: usize,
    closed: usize,
}

/// Scripted in-memory store.
///
/// Clones share state, so a test can hand one clone to a
/// [`ProbeRunner`](crate::ProbeRunner) and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Creates a store where every operation succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `op` fail with `message`. A failing [`MockOp::Connect`] is
    /// reported as a refused connection, anything else as a server error.
    pub fn fail(self, op: MockOp, message: impl Into<String>) -> Self {
        self.lock().failures.insert(op, message.into());
        self
    }

    /// Makes `op` take `delay` before completing.
    pub fn delay(self, op: MockOp, delay: Duration) -> Self {
        self.lock().delays.insert(op, delay);
        self
    }

    /// Makes `GET` return a value that differs from what was stored.
    pub fn corrupt_reads(self) -> Self {
        self.lock().corrupt_reads = true;
        self
    }

    /// Pre-populates a key.
    pub fn with_key(self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.lock().data.insert(key.into(), value.into());
        self
    }

    /// Replaces the `CLUSTER INFO` reply text.
    pub fn cluster_info_text(self, text: impl Into<String>) -> Self {
        self.lock().cluster_info = Some(text.into());
        self
    }

    /// Connections successfully opened.
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Connections closed.
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Whether the store currently holds `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.lock().data.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every operation attempted, in order.
    pub fn calls(&self) -> Vec<MockOp> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records the call, waits out any scripted delay and returns any scripted
/// failure. The lock is released before sleeping.
async fn enter(state: &Mutex<MockState>, op: MockOp) -> Result<()> {
    let (delay, failure) = {
        let mut st = lock(state);
        st.calls.push(op);
        (st.delays.get(&op).copied(), st.failures.get(&op).cloned())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    match failure {
        None => Ok(()),
        Some(message) if op == MockOp::Connect => Err(Error::Io {
            source: io::Error::new(io::ErrorKind::ConnectionRefused, message),
        }),
        Some(message) => Err(Error::Server { message }),
    }
}

impl StoreConnector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, _config: &ClusterEndpointConfig) -> Result<MockConnection> {
        enter(&self.state, MockOp::Connect).await?;
        self.lock().opened += 1;
        Ok(MockConnection {
            state: self.state.clone(),
        })
    }
}

/// Connection handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl StoreConnection for MockConnection {
    fn describe(&self) -> String {
        "connected to mock store".to_string()
    }

    async fn ping(&mut self) -> Result<String> {
        enter(&self.state, MockOp::Ping).await?;
        Ok("PONG".to_string())
    }

    async fn cluster_info(&mut self) -> Result<String> {
        enter(&self.state, MockOp::ClusterInfo).await?;
        let text = lock(&self.state).cluster_info.clone();
        Ok(text.unwrap_or_else(|| CLUSTER_INFO.to_string()))
    }

    async fn set(&mut self, key: &str, value: Bytes) -> Result<()> {
        enter(&self.state, MockOp::Set).await?;
        lock(&self.state).data.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        enter(&self.state, MockOp::Get).await?;
        let st = lock(&self.state);
        let value = st.data.get(key).cloned();
        if !st.corrupt_reads {
            return Ok(value);
        }
        Ok(value.map(|v| {
            let mut corrupted = BytesMut::from(&v[..]);
            corrupted.extend_from_slice(b"~");
            corrupted.freeze()
        }))
    }

    async fn del(&mut self, key: &str) -> Result<bool> {
        enter(&self.state, MockOp::Del).await?;
        Ok(lock(&self.state).data.remove(key).is_some())
    }

    async fn close(self) {
        lock(&self.state).closed += 1;
    }
}
