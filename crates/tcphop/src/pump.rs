//! Directional byte pumps.
//!
//! A pump copies one direction of a session until its reader reaches
//! end-of-stream, an I/O error occurs, or the session's [`CloseCoordinator`]
//! fires. A pending read is interrupted as soon as the coordinator fires; a
//! write of bytes already read gets [`CLOSE_LINGER`] to finish before it is
//! abandoned, so a peer that stopped reading cannot hold the session open.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::closer::CloseCoordinator;

/// How long an in-flight write may continue after the session was closed.
pub const CLOSE_LINGER: Duration = Duration::from_millis(500);

/// Which leg a pump reads from and which it writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Inbound connection to outbound connection.
    ClientToDestination,
    /// Outbound connection to inbound connection.
    DestinationToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToDestination => f.write_str("client->destination"),
            Self::DestinationToClient => f.write_str("destination->client"),
        }
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpEnd {
    /// The reader reached end-of-stream.
    Eof,
    /// The session was already being torn down when the pump stopped, either
    /// because its pending read was cancelled or because an I/O error surfaced
    /// after the close. Expected; never reported as a failure.
    Closed,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
}

impl PumpEnd {
    /// Genuine I/O failure, as opposed to a normal or close-induced end.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::ReadFailed(_) | Self::WriteFailed(_))
    }

    /// Classify an I/O error by cause: once the coordinator has fired, any
    /// error on this leg is a consequence of the teardown.
    fn from_io(closer: &CloseCoordinator, err: io::Error, read: bool) -> Self {
        if closer.is_closed() {
            Self::Closed
        } else if read {
            Self::ReadFailed(err)
        } else {
            Self::WriteFailed(err)
        }
    }
}

impl fmt::Display for PumpEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("end of stream"),
            Self::Closed => f.write_str("closed by session"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
        }
    }
}

/// Result of one pump run.
#[derive(Debug)]
pub struct PumpOutcome {
    pub direction: Direction,
    /// Bytes written to the destination side of this pump.
    pub bytes: u64,
    pub end: PumpEnd,
}

/// Copy `reader` into `writer` until the stream ends, then trigger the
/// session close.
///
/// On return the writer has been shut down and `closer` has fired, whether
/// this pump performed the close or the other one did.
pub async fn pump<R, W>(
    direction: Direction,
    mut reader: R,
    mut writer: W,
    closer: &CloseCoordinator,
    buffer_size: usize,
) -> PumpOutcome
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut bytes = 0u64;

    let end = loop {
        let n = tokio::select! {
            biased;
            () = closer.closed() => break PumpEnd::Closed,
            res = reader.read(&mut buf) => match res {
                Ok(0) => break PumpEnd::Eof,
                Ok(n) => n,
                Err(e) => break PumpEnd::from_io(closer, e, true),
            },
        };

        let write = async {
            writer.write_all(&buf[..n]).await?;
            writer.flush().await
        };
        let res = tokio::select! {
            res = write => res,
            () = linger_after_close(closer) => {
                debug!(%direction, pending = n, "Abandoning write after close");
                break PumpEnd::Closed;
            }
        };
        if let Err(e) = res {
            break PumpEnd::from_io(closer, e, false);
        }
        bytes += n as u64;
    };

    let shutdown = tokio::select! {
        res = writer.shutdown() => res,
        () = linger_after_close(closer) => Err(io::ErrorKind::TimedOut.into()),
    };
    if let Err(e) = shutdown {
        debug!(%direction, error = %e, "Shutdown of write side failed");
    }

    match &end {
        PumpEnd::ReadFailed(e) | PumpEnd::WriteFailed(e) => {
            warn!(%direction, bytes, error = %e, "Relay copy failed");
        }
        PumpEnd::Eof | PumpEnd::Closed => {
            debug!(%direction, bytes, end = %end, "Pump finished");
        }
    }

    closer.close();

    PumpOutcome {
        direction,
        bytes,
        end,
    }
}

async fn linger_after_close(closer: &CloseCoordinator) {
    closer.closed().await;
    tokio::time::sleep(CLOSE_LINGER).await;
}
