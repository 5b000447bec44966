use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use super::address::NodeAddress;
use super::command::{self, Cmd};
use crate::cluster::parse_redis_error;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Byte stream a node connection runs over (plain TCP or TLS).
pub trait NodeIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> NodeIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream used by dialed connections.
pub type NodeStream = Box<dyn NodeIo>;

/// Username and password sent with `AUTH` on every node connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// ACL user; `None` authenticates as the default user.
    pub username: Option<String>,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How node connections are opened.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Wrap every connection in TLS.
    pub tls: bool,
    /// PEM file with extra trust anchors, such as the CA of a cluster using
    /// self-signed certificates. Added on top of the webpki roots.
    pub ca_cert: Option<PathBuf>,
    /// Sent with `AUTH` on every connection.
    pub credentials: Option<Credentials>,
    /// Limit on bootstrapping a single seed. An unresponsive seed then fails
    /// on its own instead of holding up the seeds after it.
    pub seed_timeout: Option<Duration>,
}

/// A framed request/response connection to a single node.
///
/// Commands are strictly sequential: one request is written, then its reply
/// is read. If a request future is dropped between the two (for example by
/// a timeout), the connection remembers that a reply is still owed and
/// reports itself as [desynced](Connection::is_desynced); callers must
/// discard it rather than reuse it.
pub struct Connection<S> {
    stream: S,
    address: NodeAddress,
    decoder: Decoder,
    encoder: Encoder,
    in_flight: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream to `address`.
    pub fn new(stream: S, address: NodeAddress) -> Self {
        Self {
            stream,
            address,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            in_flight: false,
        }
    }

    /// Address of the node on the other end.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// True if a previous request never received its reply.
    pub fn is_desynced(&self) -> bool {
        self.in_flight
    }

    /// Writes one frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one complete frame, pulling more bytes from the socket as needed.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(frame);
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(Error::Protocol {
                    message: format!("connection to {} closed by peer", self.address),
                });
            }
            self.decoder.append(&buf[..n]);
        }
    }

    /// Sends a command and returns its reply.
    ///
    /// Error replies are turned into typed errors (`MOVED`, `ASK`,
    /// `CLUSTERDOWN`, or [`Error::Server`]).
    #[instrument(skip(self, cmd), fields(node = %self.address, cmd = %cmd.name()), level = "debug")]
    pub async fn request(&mut self, cmd: Cmd) -> Result<Frame> {
        self.in_flight = true;
        self.write_frame(&cmd.into_frame()).await?;
        let frame = self.read_frame().await?;
        self.in_flight = false;

        match frame {
            Frame::Error(message) => Err(parse_redis_error(&message)),
            frame => {
                debug!(?frame, "reply");
                Ok(frame)
            }
        }
    }

    /// Sends `AUTH` when credentials are configured.
    pub async fn authenticate(&mut self, credentials: Option<&Credentials>) -> Result<()> {
        let Some(creds) = credentials else {
            return Ok(());
        };
        let cmd = command::auth(creds.username.as_deref(), &creds.password);
        match self.request(cmd).await {
            Ok(frame) => command::expect_status(frame).map(|_| ()),
            Err(Error::Server { message }) => Err(Error::Auth { message }),
            Err(e) => Err(e),
        }
    }

    /// Flushes and closes the write half. Errors are ignored since the
    /// connection is being discarded.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(node = %self.address, error = %e, "shutdown failed");
        }
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Opens a TCP (optionally TLS) connection to `address` and authenticates.
pub async fn dial(
    address: &NodeAddress,
    options: &ConnectOptions,
) -> Result<Connection<NodeStream>> {
    let tcp = TcpStream::connect((address.host(), address.port())).await?;
    tcp.set_nodelay(true)?;

    let stream: NodeStream = if options.tls {
        wrap_tls(address.host(), tcp, options).await?
    } else {
        Box::new(tcp)
    };

    let mut conn = Connection::new(stream, address.clone());
    conn.authenticate(options.credentials.as_ref()).await?;
    debug!(node = %address, tls = options.tls, "dialed");
    Ok(conn)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "tls")] {
        async fn wrap_tls(
            host: &str,
            tcp: TcpStream,
            options: &ConnectOptions,
        ) -> Result<NodeStream> {
            let connector = super::tls::TlsConnectorInner::new(options.ca_cert.as_deref())?;
            let stream = connector.connect(host, tcp).await?;
            Ok(Box::new(stream))
        }
    } else {
        async fn wrap_tls(
            _host: &str,
            _tcp: TcpStream,
            _options: &ConnectOptions,
        ) -> Result<NodeStream> {
            Err(Error::Tls {
                message: "TLS requested but muxprobe was built without the `tls` feature"
                    .to_string(),
            })
        }
    }
}
