//! Tokio driver for server connections.
//!
//! [`serve`] pumps one byte stream through a [`Connection`]; [`Server`]
//! accepts TCP clients and runs one task per connection.

use std::sync::Arc;
use std::time::Duration;

use postwire_smtp::Capability;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{Result, ServerError};
use crate::handler::Handler;
use crate::session::ConnectionInfo;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Listening SMTP server.
///
/// Each accepted client gets a fresh handler from `factory`.
pub struct Server<F> {
    config: Arc<ServerConfig>,
    capabilities: Arc<[Capability]>,
    factory: F,
}

impl<F> std::fmt::Debug for Server<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<F, H> Server<F>
where
    F: Fn(&ConnectionInfo) -> H,
    H: Handler + 'static,
{
    /// Creates a server. The capability list is computed here once.
    #[must_use]
    pub fn new(config: ServerConfig, factory: F) -> Self {
        let capabilities = config.capabilities().into();
        Self {
            config: Arc::new(config),
            capabilities,
            factory,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates the connection state machine for a new client.
    pub fn connection(&self, info: ConnectionInfo) -> Connection<H> {
        let handler = (self.factory)(&info);
        Connection::new(
            Arc::clone(&self.config),
            Arc::clone(&self.capabilities),
            handler,
            info,
        )
    }

    /// Accepts clients forever, serving each on its own task.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting a connection fails.
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            addr = ?listener.local_addr().ok(),
            hostname = %self.config.hostname,
            "listening"
        );

        loop {
            let (stream, peer) = listener.accept().await?;
            let local = stream.local_addr()?;
            let info = ConnectionInfo::new(peer, local);
            let connection = self.connection(info);
            let io_timeout = self.config.io_timeout;

            let span = tracing::info_span!("session", %peer);
            tokio::spawn(
                async move {
                    tracing::debug!("client connected");
                    match serve(stream, connection, io_timeout).await {
                        Ok(_) => tracing::debug!("client disconnected"),
                        Err(ServerError::Timeout(after)) => {
                            tracing::warn!(?after, "session timed out");
                        }
                        Err(error) => tracing::warn!(%error, "session ended with error"),
                    }
                }
                .instrument(span),
            );
        }
    }
}

/// Drives `connection` over `stream` until either side closes.
///
/// Sends the greeting, then alternates between flushing queued replies
/// and reading client input. A read that takes longer than `io_timeout`
/// is answered with a 421.
///
/// Returns the handler once the session ends.
///
/// # Errors
///
/// Returns an error on I/O failure, read timeout, or an internal hook
/// failure. Queued replies (including the final 421) are flushed first
/// where the stream allows.
#[tracing::instrument(skip_all, fields(peer = %connection.session().connection().peer))]
pub async fn serve<S, H>(mut stream: S, mut connection: Connection<H>, io_timeout: Duration) -> Result<H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: Handler,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    connection.greeting();

    loop {
        flush(&mut stream, &mut connection).await?;
        if connection.is_closed() {
            break;
        }

        let read = tokio::time::timeout(io_timeout, stream.read(&mut buf)).await;
        let n = match read {
            Ok(result) => result?,
            Err(_) => {
                connection.handle_timeout();
                flush(&mut stream, &mut connection).await?;
                let _ = stream.shutdown().await;
                return Err(ServerError::Timeout(io_timeout));
            }
        };
        if n == 0 {
            tracing::debug!("client closed the stream");
            break;
        }

        if let Err(error) = connection.handle_input(&buf[..n]) {
            let _ = flush(&mut stream, &mut connection).await;
            let _ = stream.shutdown().await;
            return Err(error);
        }
    }

    let _ = stream.shutdown().await;
    Ok(connection.into_handler())
}

async fn flush<S, H>(stream: &mut S, connection: &mut Connection<H>) -> Result<()>
where
    S: AsyncWrite + Unpin,
    H: Handler,
{
    let mut wrote = false;
    while let Some(transmit) = connection.poll_transmit() {
        tracing::trace!(data = transmit.as_str().unwrap_or("<binary>"), "S:");
        stream.write_all(transmit.as_ref()).await?;
        wrote = true;
    }
    if wrote {
        stream.flush().await?;
    }
    Ok(())
}
