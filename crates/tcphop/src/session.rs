//! Relay session: one inbound connection, one outbound connection, two pumps.
//!
//! Lifecycle: `Dialing -> Relaying -> Closing -> Closed`, or straight from
//! `Dialing` to `Closed` when the destination cannot be reached. The reverse
//! pump (destination to client) runs in its own task while the forward pump
//! runs on the session task; the session only finishes after both returned.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, warn};

use tcphop_core::{Error, RelayConfig, Result};

use crate::closer::CloseCoordinator;
use crate::pump::{Direction, PumpEnd, PumpOutcome, pump};

/// Identifier assigned by the listener in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Dialing,
    Relaying,
    Closing,
    Closed,
}

/// Both pump results of a session that reached the relay phase.
#[derive(Debug)]
pub struct RelayReport {
    pub client_to_destination: PumpOutcome,
    pub destination_to_client: PumpOutcome,
    /// Number of times the close action ran. Always 1.
    pub closes: usize,
}

#[derive(Debug)]
pub enum SessionOutcome {
    /// The destination could not be reached; no pump was started.
    DialFailed(Error),
    Relayed(RelayReport),
}

#[derive(Debug)]
pub struct SessionReport {
    pub id: SessionId,
    pub peer: Option<SocketAddr>,
    pub state: SessionState,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    pub const fn relay(&self) -> Option<&RelayReport> {
        match &self.outcome {
            SessionOutcome::Relayed(report) => Some(report),
            SessionOutcome::DialFailed(_) => None,
        }
    }
}

pub struct RelaySession {
    id: SessionId,
    peer: Option<SocketAddr>,
    config: Arc<RelayConfig>,
    state: watch::Sender<SessionState>,
}

impl RelaySession {
    pub fn new(id: SessionId, peer: Option<SocketAddr>, config: Arc<RelayConfig>) -> Self {
        Self {
            id,
            peer,
            config,
            state: watch::Sender::new(SessionState::Dialing),
        }
    }

    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follow state changes while the session runs.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        debug!(from = ?prev, to = ?next, "Session state change");
    }

    /// Dial the destination and relay `inbound` through it until either side
    /// ends. The inbound connection is always closed when this returns.
    pub async fn run<S>(self, inbound: S) -> SessionReport
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let outbound = match dial(&self.config.destination_addr, self.config.connect_timeout).await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Couldn't connect to destination");
                drop(inbound);
                self.transition(SessionState::Closed);
                return self.finish(SessionOutcome::DialFailed(e));
            }
        };
        match outbound.peer_addr() {
            Ok(addr) => info!(destination = %addr, "Connected to destination"),
            Err(_) => info!(destination = %self.config.destination_addr, "Connected to destination"),
        }

        self.transition(SessionState::Relaying);
        let report = self.relay(inbound, outbound).await;
        self.transition(SessionState::Closed);

        info!(
            sent = report.client_to_destination.bytes,
            received = report.destination_to_client.bytes,
            "Session finished"
        );
        self.finish(SessionOutcome::Relayed(report))
    }

    /// Relay phase over two already-connected streams.
    pub async fn relay<A, B>(&self, inbound: A, outbound: B) -> RelayReport
    where
        A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let buffer_size = self.config.buffer_size;
        let closer = Arc::new(CloseCoordinator::new());
        let (inbound_r, inbound_w) = tokio::io::split(inbound);
        let (outbound_r, outbound_w) = tokio::io::split(outbound);

        let reverse = {
            let closer = Arc::clone(&closer);
            tokio::spawn(
                async move {
                    pump(
                        Direction::DestinationToClient,
                        outbound_r,
                        inbound_w,
                        &closer,
                        buffer_size,
                    )
                    .await
                }
                .in_current_span(),
            )
        };

        let forward = pump(
            Direction::ClientToDestination,
            inbound_r,
            outbound_w,
            &closer,
            buffer_size,
        );
        tokio::pin!(forward);
        // Whichever pump ends first fires the close; that starts `Closing`.
        let forward = tokio::select! {
            outcome = &mut forward => outcome,
            () = closer.closed() => {
                self.transition(SessionState::Closing);
                forward.await
            }
        };
        if self.state() == SessionState::Relaying {
            self.transition(SessionState::Closing);
        }

        let backward = match reverse.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Destination pump task failed");
                PumpOutcome {
                    direction: Direction::DestinationToClient,
                    bytes: 0,
                    end: PumpEnd::ReadFailed(io::Error::other(e)),
                }
            }
        };

        RelayReport {
            client_to_destination: forward,
            destination_to_client: backward,
            closes: closer.close_count(),
        }
    }

    fn finish(self, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            id: self.id,
            peer: self.peer,
            state: self.state(),
            outcome,
        }
    }
}

async fn dial(addr: &str, timeout: Option<Duration>) -> Result<TcpStream> {
    let connect = TcpStream::connect(addr);
    let res = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| Error::DialTimeout {
                addr: addr.to_string(),
                timeout: limit,
            })?,
        None => connect.await,
    };
    let stream = res.map_err(|source| Error::Dial {
        addr: addr.to_string(),
        source,
    })?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY on outbound connection");
    }
    Ok(stream)
}
