//! One-shot close coordination shared by the two pumps of a session.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tears down both legs of a session exactly once.
///
/// Either pump may call [`close`](Self::close) from its own task; only the
/// first call performs the close, later calls return `false` without effect.
/// Closing cancels every pending read raced against [`closed`](Self::closed),
/// which is what unblocks the pump that is still running. Sockets themselves
/// are released when the pumps return and drop their halves.
#[derive(Debug, Default)]
pub struct CloseCoordinator {
    fired: AtomicBool,
    performed: AtomicUsize,
    token: CancellationToken,
}

impl CloseCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the close action if nobody has yet.
    ///
    /// Returns `true` for the caller that performed the close.
    pub fn close(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Close already performed");
            return false;
        }
        self.performed.fetch_add(1, Ordering::Relaxed);
        self.token.cancel();
        info!("Connections closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once the close action has run.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }

    /// How many times the close action executed. Never more than one.
    pub fn close_count(&self) -> usize {
        self.performed.load(Ordering::Relaxed)
    }
}
