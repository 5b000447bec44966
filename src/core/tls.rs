use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::{Error, Result};

/// TLS client built on rustls with Mozilla's root certificates.
#[derive(Clone)]
pub struct TlsConnectorInner {
    connector: TlsConnector,
}

impl TlsConnectorInner {
    /// Creates a connector using `webpki-roots` and the `ring` provider.
    ///
    /// Certificates in the PEM file at `ca_cert`, if given, are trusted as
    /// well.
    pub fn new(ca_cert: Option<&Path>) -> Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(path) = ca_cert {
            add_pem_roots(&mut root_store, path)?;
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls {
                message: e.to_string(),
            })?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Performs the TLS handshake over `tcp`, verifying the certificate for `host`.
    pub async fn connect(&self, host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        let server_name = ServerName::try_from(host.to_string()).map_err(|e| Error::Tls {
            message: format!("invalid server name {host:?}: {e}"),
        })?;
        self.connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::Tls {
                message: format!("handshake with {host} failed: {e}"),
            })
    }
}

fn add_pem_roots(root_store: &mut RootCertStore, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| Error::Tls {
        message: format!("cannot read CA certificate {}: {e}", path.display()),
    })?;

    let mut added = 0;
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let cert = cert.map_err(|e| Error::Tls {
            message: format!("malformed PEM in {}: {e}", path.display()),
        })?;
        root_store.add(cert).map_err(|e| Error::Tls {
            message: format!("invalid CA certificate in {}: {e}", path.display()),
        })?;
        added += 1;
    }

    if added == 0 {
        return Err(Error::Tls {
            message: format!("no certificates found in {}", path.display()),
        });
    }
    Ok(())
}
