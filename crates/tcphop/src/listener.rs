//! Accept loop: binds the listen address and spawns one relay session per
//! accepted connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span};

use tcphop_core::{Error, RelayConfig, Result};

use crate::session::{RelaySession, SessionId, SessionOutcome};

pub struct Listener {
    inner: TcpListener,
    config: Arc<RelayConfig>,
    sessions: TaskTracker,
    admission: Option<Arc<Semaphore>>,
    next_id: u64,
}

impl Listener {
    /// Bind the configured listen address. Failure here is fatal for the
    /// process; there is no retry.
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let inner = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        info!(
            addr = %config.listen_addr,
            destination = %config.destination_addr,
            "Start listening"
        );
        let admission = config.max_sessions.map(|n| Arc::new(Semaphore::new(n)));
        Ok(Self {
            inner,
            config: Arc::new(config),
            sessions: TaskTracker::new(),
            admission,
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Handle on the running sessions, usable after `serve` consumed the
    /// listener.
    pub fn sessions(&self) -> TaskTracker {
        self.sessions.clone()
    }

    /// Accept connections until `shutdown` resolves or accepting fails.
    ///
    /// Sessions are fire-and-forget: the loop never waits on them, except
    /// after an accept failure, where it stops accepting and lets the sessions
    /// already running finish before returning the error.
    pub async fn serve<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let permit = match &self.admission {
                Some(admission) => {
                    if admission.available_permits() == 0 {
                        debug!("Session limit reached, waiting for a slot");
                    }
                    tokio::select! {
                        () = &mut shutdown => break,
                        permit = Arc::clone(admission).acquire_owned() => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => break,
                        },
                    }
                }
                None => None,
            };

            let accepted = tokio::select! {
                () = &mut shutdown => break,
                res = self.inner.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => self.dispatch(stream, peer, permit),
                Err(e) => {
                    error!(error = %e, "Accept failed, no longer accepting connections");
                    self.sessions.close();
                    let active = self.sessions.len();
                    if active > 0 {
                        info!(active, "Waiting for active sessions to finish");
                    }
                    tokio::select! {
                        () = self.sessions.wait() => {}
                        () = &mut shutdown => {}
                    }
                    return Err(Error::Accept(e));
                }
            }
        }

        self.sessions.close();
        info!(active = self.sessions.len(), "Stopped accepting connections");
        Ok(())
    }

    fn dispatch(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        info!(session = %id, peer = %peer, "Accepted connection");
        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = %id, error = %e, "Failed to set TCP_NODELAY on inbound connection");
        }

        let session = RelaySession::new(id, Some(peer), Arc::clone(&self.config));
        let span = info_span!("session", id = %id, peer = %peer);
        self.sessions.spawn(
            async move {
                let report = session.run(stream).await;
                drop(permit);
                if let SessionOutcome::DialFailed(e) = &report.outcome {
                    debug!(error = %e, "Session ended without relaying");
                }
            }
            .instrument(span),
        );
    }
}
