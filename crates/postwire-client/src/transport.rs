//! Outbound transport: plain TCP or implicit TLS.
//!
//! MX resolution and failover are left to the caller; these helpers only
//! open a stream to a known exchange.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Connects to a mail exchange over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(hostname, port, "connected");
    Ok(stream)
}

/// Connects to a mail exchange over implicit TLS (port 465).
///
/// # Errors
///
/// Returns an error if the host name is not a valid DNS name, or if the
/// connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::InvalidDnsName(hostname.to_string()))?;

    let stream = connect(hostname, port).await?;
    let stream = tls_connector().connect(server_name, stream).await?;
    tracing::debug!(hostname, port, "TLS established");
    Ok(stream)
}

/// Creates a TLS connector trusting the webpki root certificates.
fn tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
