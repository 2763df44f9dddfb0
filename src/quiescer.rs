//! Interface quiescer
//!
//! Takes exclusive control of an adapter before hostapd binds it:
//!
//! 1. stop the connection-management service (through the lease)
//! 2. SIGKILL every supplicant whose arguments reference the adapter
//! 3. pause so the kernel releases the interface
//! 4. cycle the link: down, then up
//!
//! The first failing step aborts the rest.

use crate::adapters::Adapter;
use crate::error::QuiesceError;
use crate::host::{Host, ProcessInfo};
use crate::management::ManagementLease;
use crate::tool_traits::ToolArgs;
use crate::tools::IpLinkArgs;
use crate::types::{LinkState, QuiesceStep};
use std::time::Duration;
use tracing::info;

pub struct Quiescer<'a> {
    host: &'a dyn Host,
    supplicant: &'a str,
    settle: Duration,
}

impl<'a> Quiescer<'a> {
    pub fn new(host: &'a dyn Host, supplicant: &'a str, settle: Duration) -> Self {
        Self {
            host,
            supplicant,
            settle,
        }
    }

    /// Quiesce `adapter`, suspending management through `lease`.
    pub fn quiesce(
        &self,
        adapter: &Adapter,
        lease: &mut ManagementLease,
    ) -> Result<(), QuiesceError> {
        println!("[*] Taking control of {}...", adapter.name);

        lease.suspend()?;
        self.kill_supplicants(adapter)?;
        self.host.pause(self.settle);
        self.set_link(adapter, LinkState::Down, QuiesceStep::LinkDown)?;
        self.set_link(adapter, LinkState::Up, QuiesceStep::LinkUp)?;

        info!("{} quiesced", adapter.name);
        Ok(())
    }

    fn kill_supplicants(&self, adapter: &Adapter) -> Result<(), QuiesceError> {
        let processes = self
            .host
            .processes()
            .map_err(|e| QuiesceError::new(QuiesceStep::EnumerateProcesses, format!("{:#}", e)))?;

        for process in find_supplicants(&processes, self.supplicant, &adapter.name) {
            info!(
                "Killing {} (PID {}) bound to {}",
                self.supplicant, process.pid, adapter.name
            );
            self.host.kill(process.pid).map_err(|e| {
                QuiesceError::new(QuiesceStep::TerminateSupplicant, format!("{:#}", e))
            })?;
        }

        Ok(())
    }

    fn set_link(
        &self,
        adapter: &Adapter,
        state: LinkState,
        step: QuiesceStep,
    ) -> Result<(), QuiesceError> {
        let args = IpLinkArgs {
            interface: adapter.name.clone(),
            state,
        };
        let output = self
            .host
            .run(&args)
            .map_err(|e| QuiesceError::new(step, format!("{:#}", e)))?;
        output
            .ensure_success(&args.command_line())
            .map_err(|reason| QuiesceError::new(step, reason))
    }
}

/// Supplicant processes whose command line references `interface`.
///
/// A process matches when argv[0]'s file name contains `supplicant` and any
/// argument is the interface name on its own or in the `-i<if>` form.
pub fn find_supplicants<'p>(
    processes: &'p [ProcessInfo],
    supplicant: &str,
    interface: &str,
) -> Vec<&'p ProcessInfo> {
    let short_flag = format!("-i{}", interface);
    processes
        .iter()
        .filter(|process| {
            process
                .cmdline
                .first()
                .and_then(|argv0| argv0.rsplit('/').next())
                .is_some_and(|name| name.contains(supplicant))
        })
        .filter(|process| {
            process
                .cmdline
                .iter()
                .skip(1)
                .any(|arg| arg == interface || *arg == short_flag)
        })
        .collect()
}
