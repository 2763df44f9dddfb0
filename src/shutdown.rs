//! Cooperative shutdown requests
//!
//! The interrupt handler does not tear anything down itself. It flips a
//! [`Shutdown`] that the run scope observes: the selector stops waiting for
//! input, the portal drains and returns, and the orchestrator unwinds through
//! its own guards so daemons stop before management is restarted.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Poll interval for blocking waiters.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Set-once shutdown flag with an async wait for the portal.
#[derive(Debug)]
pub struct Shutdown {
    requested: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        let (requested, _) = watch::channel(false);
        Arc::new(Self { requested })
    }

    /// Ask the run to wind down. Repeated requests are no-ops.
    pub fn request(&self) {
        self.requested.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut rx = self.requested.subscribe();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Block the calling thread until shutdown is requested or `timeout`
    /// passes. Returns whether it was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_requested() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        true
    }
}
