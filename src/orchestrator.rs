//! Lifecycle orchestrator
//!
//! Drives one run from adapter selection to a serving captive portal:
//!
//! ```text
//! list adapters → select adapter → scan → select network
//!     → quiesce → hostapd → dnsmasq → portal (blocks)
//! ```
//!
//! The management lease is taken before anything else, so whatever way the
//! run ends (`?`, normal return, panic unwind, interrupt) the
//! connection-management service is restarted exactly once. Daemon handles
//! live inside [`drive`] and are stopped first, so daemons are gone before
//! management comes back.
//!
//! An interrupt only requests [`Shutdown`]. The run notices it between steps,
//! at a pending prompt, or when the portal returns, and unwinds the same way
//! as any other exit.
//!
//! [`drive`]: Orchestrator::drive

use crate::access_point::{AccessPointConfig, HostapdDaemon, launch_ap};
use crate::adapters::{Adapter, list_adapters};
use crate::address_service::{AddressServiceConfig, DnsmasqDaemon, launch_dhcp_dns};
use crate::config_file::TwinConfig;
use crate::daemon::ConfigurableDaemon;
use crate::error::{Result, SelectionError, TwinError};
use crate::host::Host;
use crate::management::{ManagementLease, Restoration};
use crate::portal::{CredentialSink, PortalServer};
use crate::quiescer::Quiescer;
use crate::run_state::{RunContext, RunStage};
use crate::scanner::{self, NetworkIdentifier};
use crate::selection::Selector;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub adapter: String,
    pub ssid: NetworkIdentifier,
    /// Stage the run left from when it terminated
    pub ended_at: RunStage,
}

pub struct Orchestrator<'a> {
    host: Arc<dyn Host>,
    config: &'a TwinConfig,
    restoration: Arc<Restoration>,
    shutdown: Arc<Shutdown>,
    preset_interface: Option<String>,
    preset_ssid: Option<NetworkIdentifier>,
}

impl<'a> Orchestrator<'a> {
    /// `restoration` and `shutdown` must be the instances the interrupt
    /// handler holds.
    pub fn new(
        host: Arc<dyn Host>,
        config: &'a TwinConfig,
        restoration: Arc<Restoration>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            host,
            config,
            restoration,
            shutdown,
            preset_interface: None,
            preset_ssid: None,
        }
    }

    /// Use this adapter instead of asking. It must still be in the inventory.
    pub fn with_interface(mut self, interface: Option<String>) -> Self {
        self.preset_interface = interface;
        self
    }

    /// Impersonate this network without scanning.
    pub fn with_ssid(mut self, ssid: Option<NetworkIdentifier>) -> Self {
        self.preset_ssid = ssid;
        self
    }

    /// Run to completion. Management is restored before this returns.
    pub fn run(
        &self,
        selector: &mut dyn Selector,
        portal: &dyn PortalServer,
        sink: Arc<dyn CredentialSink>,
    ) -> Result<RunReport> {
        let mut lease = ManagementLease::acquire(Arc::clone(&self.restoration));
        let mut state = RunContext::new();

        let mut result = self.drive(&mut state, &mut lease, selector, portal, sink);
        if self.shutdown.is_requested() {
            if let Err(e) = &result {
                if !e.is_interrupted() {
                    warn!("Run ended by interrupt; dropping error: {}", e);
                }
            }
            result = Err(TwinError::Interrupted);
        }

        state.terminate();
        let ended_at = state.terminated_from().unwrap_or(RunStage::Idle);
        match &result {
            Ok(_) => info!("Run finished at stage: {}", ended_at),
            Err(e) if e.is_interrupted() => info!("Run interrupted at stage: {}", ended_at),
            Err(e) => error!("Run failed at stage {}: {}", ended_at, e),
        }

        drop(lease);
        result.map(|(adapter, ssid)| RunReport {
            adapter: adapter.name,
            ssid,
            ended_at,
        })
    }

    fn drive(
        &self,
        state: &mut RunContext,
        lease: &mut ManagementLease,
        selector: &mut dyn Selector,
        portal: &dyn PortalServer,
        sink: Arc<dyn CredentialSink>,
    ) -> Result<(Adapter, NetworkIdentifier)> {
        let host = self.host.as_ref();
        let config = self.config;

        self.checkpoint()?;
        let adapter = self.choose_adapter(selector)?;
        state.transition_to(RunStage::AdapterSelected)?;

        self.checkpoint()?;
        let ssid = self.choose_network(selector, &adapter)?;
        state.transition_to(RunStage::NetworkSelected)?;

        self.checkpoint()?;
        Quiescer::new(
            host,
            &config.host.supplicant_process,
            config.host.settle_delay(),
        )
        .quiesce(&adapter, lease)?;
        state.transition_to(RunStage::Quiesced)?;

        self.checkpoint()?;
        let ap_config = AccessPointConfig::new(&adapter, &ssid, &config.access_point);
        let hostapd = launch_ap(host, &ap_config, config.host.daemon_startup())?;
        state.transition_to(RunStage::ApRunning)?;

        self.checkpoint()?;
        let dhcp_config = AddressServiceConfig::new(&adapter, &config.address_service);
        let dnsmasq = launch_dhcp_dns(host, &dhcp_config, config.host.daemon_startup())?;
        state.transition_to(RunStage::ServiceRunning)?;

        self.checkpoint()?;
        state.transition_to(RunStage::PortalServing)?;
        let served = portal.serve(config.portal_addr(), sink, Arc::clone(&self.shutdown));

        // Reverse start order; early returns above stop them on drop
        DnsmasqDaemon::new(&dhcp_config).stop(dnsmasq);
        HostapdDaemon::new(&ap_config).stop(hostapd);
        served?;
        self.checkpoint()?;

        Ok((adapter, ssid))
    }

    fn checkpoint(&self) -> Result<()> {
        if self.shutdown.is_requested() {
            return Err(TwinError::Interrupted);
        }
        Ok(())
    }

    fn choose_adapter(&self, selector: &mut dyn Selector) -> Result<Adapter> {
        let mut adapters = list_adapters(self.host.as_ref())?;

        let index = match &self.preset_interface {
            Some(name) => adapters
                .iter()
                .position(|a| &a.name == name)
                .ok_or_else(|| SelectionError::UnknownAdapter(name.clone()))?,
            None => {
                println!("[*] Wireless adapters:");
                let names: Vec<String> = adapters.iter().map(|a| a.name.clone()).collect();
                selector.select("Enter the number of the adapter to use", &names)?
            }
        };

        ensure_offered(index, adapters.len())?;
        let adapter = adapters.swap_remove(index);
        info!("Using adapter {}", adapter.name);
        Ok(adapter)
    }

    fn choose_network(
        &self,
        selector: &mut dyn Selector,
        adapter: &Adapter,
    ) -> Result<NetworkIdentifier> {
        if let Some(ssid) = &self.preset_ssid {
            info!("Impersonating preset network {}", ssid);
            return Ok(ssid.clone());
        }

        let mut networks = scanner::scan(self.host.as_ref(), adapter, self.config.host.scan_strategy)?;
        println!("[*] Available Wi-Fi networks:");
        let index = selector.select(
            "Enter the number of the network you want to mimic",
            &networks,
        )?;

        ensure_offered(index, networks.len())?;
        let ssid = networks.swap_remove(index);
        info!("Impersonating {}", ssid);
        Ok(ssid)
    }
}

/// Guard against selectors that return an index outside the offered list.
fn ensure_offered(index: usize, len: usize) -> std::result::Result<(), SelectionError> {
    if index >= len {
        return Err(SelectionError::OutOfRange {
            choice: index + 1,
            len,
        });
    }
    Ok(())
}

/// Process exit code for a finished run.
///
/// 0 only when the run completed or was interrupted and host networking was
/// restored; every other outcome is 1.
pub fn exit_code(result: &Result<RunReport>, restoration: &Restoration) -> i32 {
    let run_code = match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    };
    if restoration.succeeded() == Some(true) {
        run_code
    } else {
        1
    }
}
