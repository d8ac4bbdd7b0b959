//! Tokio driver for a client connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::assignment::Assignment;
use crate::commander::Commander;
use crate::config::ClientConfig;
use crate::error::{Error, Fatal, Result};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Runs a client session over an established `stream`.
///
/// Assignments are taken from `assignments` and sent one after the
/// other. While nothing is queued the connection is kept alive with
/// NOOPs. Once the sender side of `assignments` is dropped and the queue
/// has drained, the session ends with QUIT.
///
/// # Errors
///
/// Returns [`Fatal`] when the session breaks. It carries every assignment
/// that was not acknowledged, including those still in the channel, so
/// they can be retried elsewhere.
#[tracing::instrument(skip_all, fields(hostname = %config.hostname))]
pub async fn run<S>(
    mut stream: S,
    config: ClientConfig,
    mut assignments: mpsc::Receiver<Assignment>,
) -> std::result::Result<(), Fatal>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut commander = Commander::new(config);

    match drive(&mut stream, &mut commander, &mut assignments).await {
        Ok(()) => {
            let _ = stream.shutdown().await;
            Ok(())
        }
        Err(error) => {
            let mut pending = commander.take_pending();
            assignments.close();
            while let Ok(assignment) = assignments.try_recv() {
                pending.push(assignment);
            }
            tracing::warn!(%error, pending = pending.len(), "client session failed");
            Err(Fatal { error, pending })
        }
    }
}

async fn drive<S>(
    stream: &mut S,
    commander: &mut Commander,
    assignments: &mut mpsc::Receiver<Assignment>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut source_open = true;

    loop {
        flush(stream, commander).await?;
        if commander.is_closed() {
            return Ok(());
        }

        let deadline = commander.poll_timeout();
        tokio::select! {
            read = stream.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Err(Error::ConnectionClosed);
                }
                commander.handle_input(&buf[..n])?;
            }
            assignment = assignments.recv(), if source_open => match assignment {
                Some(assignment) => commander.enqueue(assignment),
                None => {
                    tracing::debug!("assignment source closed");
                    source_open = false;
                    commander.shutdown();
                }
            },
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                commander.handle_timeout(Instant::now());
            }
        }
    }
}

async fn flush<S>(stream: &mut S, commander: &mut Commander) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut wrote = false;
    while let Some(transmit) = commander.poll_transmit() {
        stream.write_all(transmit.as_ref()).await?;
        wrote = true;
    }
    if wrote {
        stream.flush().await?;
    }
    Ok(())
}
