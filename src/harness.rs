//! In-process fake cluster nodes for exercising the real client stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::cluster::key_slot;
use crate::core::address::NodeAddress;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;

const CLUSTER_INFO: &str = "cluster_state:ok\r\n\
    cluster_slots_assigned:16384\r\n\
    cluster_slots_ok:16384\r\n\
    cluster_known_nodes:1\r\n\
    cluster_size:1\r\n";

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeNodeOptions {
    /// Answer every keyed command with `MOVED` to this node.
    pub redirect_to: Option<NodeAddress>,
    /// Answer every keyed command with `ASK` to this node, as if its slot
    /// were migrating there.
    pub ask_to: Option<NodeAddress>,
    /// Reject `CLUSTER` commands like a non-cluster server.
    pub cluster_disabled: bool,
    /// Password accepted by `AUTH`.
    pub password: Option<String>,
    /// Delay before answering `PING`.
    pub ping_delay: Option<Duration>,
}

struct State {
    address: NodeAddress,
    options: FakeNodeOptions,
    data: Mutex<HashMap<String, Bytes>>,
    commands: Mutex<Vec<String>>,
    accepted: AtomicUsize,
}

/// A single-node cluster that owns all slots and keeps keys in memory.
pub(crate) struct FakeNode {
    state: Arc<State>,
}

impl FakeNode {
    pub(crate) async fn spawn(options: FakeNodeOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::serve(listener, options)
    }

    /// A node whose keyed commands are always redirected back to itself.
    pub(crate) async fn spawn_self_redirecting() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let own = NodeAddress::new("127.0.0.1", listener.local_addr().unwrap().port());
        Self::serve(
            listener,
            FakeNodeOptions {
                redirect_to: Some(own),
                ..FakeNodeOptions::default()
            },
        )
    }

    /// An address that accepts connections but never replies.
    pub(crate) async fn silent_address() -> NodeAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        NodeAddress::new("127.0.0.1", port)
    }

    /// An address nothing is listening on.
    pub(crate) async fn unused_address() -> NodeAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        NodeAddress::new("127.0.0.1", port)
    }

    fn serve(listener: TcpListener, options: FakeNodeOptions) -> Self {
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            address: NodeAddress::new("127.0.0.1", port),
            options,
            data: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            accepted: AtomicUsize::new(0),
        });

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle(socket, shared.clone()));
            }
        });

        Self { state }
    }

    pub(crate) fn address(&self) -> NodeAddress {
        self.state.address.clone()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state.data.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Command names received so far, uppercased, in arrival order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    pub(crate) fn connections_accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }
}

async fn handle(mut socket: TcpStream, state: Arc<State>) {
    let mut decoder = Decoder::new();
    let mut encoder = Encoder::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.append(&buf[..n]);

        while let Ok(Some(frame)) = decoder.decode() {
            let Frame::Array(items) = frame else {
                return;
            };
            let args: Vec<String> = items
                .iter()
                .filter_map(Frame::to_text)
                .collect();

            if let Some(command) = args.first() {
                state.commands.lock().unwrap().push(command.to_ascii_uppercase());
            }
            if args.first().map(|c| c.eq_ignore_ascii_case("PING")) == Some(true) {
                if let Some(delay) = state.options.ping_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            encoder.encode(&state.reply(&args));
            if socket.write_all(&encoder.take()).await.is_err() {
                return;
            }
        }
    }
}

impl State {
    fn reply(&self, args: &[String]) -> Frame {
        let command = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();
        let sub = args.get(1).map(|a| a.to_ascii_uppercase()).unwrap_or_default();
        let key = args.get(1).cloned().unwrap_or_default();

        if matches!(command.as_str(), "SET" | "GET" | "DEL") {
            if let Some(target) = &self.options.redirect_to {
                return error(&format!("MOVED {} {}", key_slot(&key), target));
            }
            if let Some(target) = &self.options.ask_to {
                return error(&format!("ASK {} {}", key_slot(&key), target));
            }
        }

        match (command.as_str(), sub.as_str()) {
            ("PING", _) => status("PONG"),
            ("ASKING", _) => status("OK"),
            ("AUTH", _) => match &self.options.password {
                Some(password) if args.last() == Some(password) => status("OK"),
                Some(_) => error("WRONGPASS invalid username-password pair or user is disabled."),
                None => error("ERR AUTH called without any password configured"),
            },
            ("CLUSTER", _) if self.options.cluster_disabled => {
                error("ERR This instance has cluster support disabled")
            }
            ("CLUSTER", "INFO") => Frame::bulk(CLUSTER_INFO),
            ("CLUSTER", "SLOTS") => Frame::Array(vec![Frame::Array(vec![
                Frame::Integer(0),
                Frame::Integer(16383),
                Frame::Array(vec![
                    Frame::bulk(self.address.host().to_string()),
                    Frame::Integer(i64::from(self.address.port())),
                    Frame::bulk("fake-node"),
                ]),
            ])]),
            ("SET", _) => {
                let value = args.get(2).cloned().unwrap_or_default();
                self.data.lock().unwrap().insert(key, Bytes::from(value));
                status("OK")
            }
            ("GET", _) => match self.data.lock().unwrap().get(&key) {
                Some(value) => Frame::Bulk(value.clone()),
                None => Frame::Null,
            },
            ("DEL", _) => {
                let removed = self.data.lock().unwrap().remove(&key).is_some();
                Frame::Integer(i64::from(removed))
            }
            _ => error(&format!("ERR unknown command '{command}'")),
        }
    }
}

fn status(text: &str) -> Frame {
    Frame::Simple(Bytes::copy_from_slice(text.as_bytes()))
}

fn error(text: &str) -> Frame {
    Frame::Error(Bytes::copy_from_slice(text.as_bytes()))
}
