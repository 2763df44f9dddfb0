//! Connection-management suspension as a scoped resource
//!
//! Host network management (NetworkManager by default) must be running before
//! the orchestrator starts and after it ends. [`ManagementLease`] models the
//! window in between: it is acquired at the top of the run scope, `suspend()`
//! stops the service at quiesce time, and dropping the lease restarts it.
//!
//! The restart itself lives in [`Restoration`], which is shared with the
//! interrupt handler. Whichever path reaches it first performs the restart;
//! every later caller gets the recorded outcome, so the service is started
//! exactly once per run.

use crate::error::QuiesceError;
use crate::host::Host;
use crate::tool_traits::ToolArgs;
use crate::tools::SystemctlArgs;
use crate::types::{QuiesceStep, ServiceAction};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Once-only restart of the connection-management service.
pub struct Restoration {
    host: Arc<dyn Host>,
    service: String,
    /// `None` until the restart ran, then whether it succeeded
    outcome: Mutex<Option<bool>>,
}

impl Restoration {
    pub fn new(host: Arc<dyn Host>, service: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            host,
            service: service.into(),
            outcome: Mutex::new(None),
        })
    }

    /// Name of the managed service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Restart the service if nobody has yet. Never fails; errors are logged.
    ///
    /// Returns true if the service was restarted successfully.
    pub fn restore(&self) -> bool {
        // A poisoned lock still holds a valid Option<bool>
        let mut outcome = match self.outcome.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(done) = *outcome {
            return done;
        }

        let args = SystemctlArgs {
            action: ServiceAction::Start,
            unit: self.service.clone(),
        };
        let restored = match self.host.run(&args) {
            Ok(output) => match output.ensure_success(&args.command_line()) {
                Ok(()) => {
                    info!("Restarted {}", self.service);
                    println!("[*] Restarted {}", self.service);
                    true
                }
                Err(reason) => {
                    error!("Failed to restore {}: {}", self.service, reason);
                    false
                }
            },
            Err(e) => {
                error!("Failed to restore {}: {:#}", self.service, e);
                false
            }
        };

        *outcome = Some(restored);
        restored
    }

    /// Whether the restart already ran (successfully or not).
    pub fn has_run(&self) -> bool {
        self.outcome.lock().map(|o| o.is_some()).unwrap_or(true)
    }

    /// `Some(true)` once the service was restarted, `Some(false)` if the
    /// restart failed, `None` if it has not run yet.
    pub fn succeeded(&self) -> Option<bool> {
        match self.outcome.lock() {
            Ok(outcome) => *outcome,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// RAII guard over "network management suspended".
///
/// Dropping the lease always runs the restoration, whether or not `suspend`
/// was ever called, so every exit from the run scope (return, `?`, panic
/// unwind) leaves the service running.
pub struct ManagementLease {
    restoration: Arc<Restoration>,
    suspended: bool,
}

impl ManagementLease {
    pub fn acquire(restoration: Arc<Restoration>) -> Self {
        Self {
            restoration,
            suspended: false,
        }
    }

    /// Stop the connection-management service.
    ///
    /// Refused once the restoration has run: a stop issued after the restart
    /// would leave the service down for good. The restoration lock is held
    /// across the stop so a concurrent restart lands after it.
    pub fn suspend(&mut self) -> Result<(), QuiesceError> {
        let outcome = match self.restoration.outcome.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if outcome.is_some() {
            return Err(QuiesceError::new(
                QuiesceStep::StopManagement,
                format!("{} was already restored for this run", self.restoration.service),
            ));
        }

        let args = SystemctlArgs {
            action: ServiceAction::Stop,
            unit: self.restoration.service.clone(),
        };
        let output = self
            .restoration
            .host
            .run(&args)
            .map_err(|e| QuiesceError::new(QuiesceStep::StopManagement, format!("{:#}", e)))?;
        output
            .ensure_success(&args.command_line())
            .map_err(|reason| QuiesceError::new(QuiesceStep::StopManagement, reason))?;
        drop(outcome);

        self.suspended = true;
        info!("Suspended {}", self.restoration.service);
        Ok(())
    }

    /// Whether `suspend` succeeded during this lease.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl Drop for ManagementLease {
    fn drop(&mut self) {
        self.restoration.restore();
    }
}
