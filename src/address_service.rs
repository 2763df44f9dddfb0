//! Address-service launcher (dnsmasq)
//!
//! Hands out leases from a private range on the AP adapter and points clients
//! at the gateway for both routing and DNS. Before dnsmasq starts, the gateway
//! address is assigned to the adapter unless the settings turn that off.

use crate::adapters::Adapter;
use crate::config_file::AddressSettings;
use crate::daemon::{self, ConfigurableDaemon, DaemonHandle};
use crate::error::LaunchError;
use crate::host::Host;
use crate::tool_traits::ToolArgs;
use crate::tools::{DnsmasqArgs, IpAddrAddArgs, IpAddrFlushArgs};
use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DAEMON: &str = "dnsmasq";

/// DHCP option 3: default router
const OPTION_ROUTER: u8 = 3;
/// DHCP option 6: DNS server
const OPTION_DNS: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressServiceConfig {
    pub adapter: String,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    pub lease: String,
    pub gateway: Ipv4Addr,
    pub prefix_len: u8,
    pub dns: Ipv4Addr,
    pub upstream: Ipv4Addr,
    pub assign_gateway: bool,
    pub config_path: PathBuf,
}

impl AddressServiceConfig {
    pub fn new(adapter: &Adapter, settings: &AddressSettings) -> Self {
        Self {
            adapter: adapter.name.clone(),
            range_start: settings.range_start,
            range_end: settings.range_end,
            lease: settings.lease.clone(),
            gateway: settings.gateway,
            prefix_len: settings.prefix_len,
            dns: settings.dns,
            upstream: settings.upstream,
            assign_gateway: settings.assign_gateway,
            config_path: settings.config_path.clone(),
        }
    }

    /// dnsmasq.conf contents.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "interface={}", self.adapter);
        let _ = writeln!(
            out,
            "dhcp-range={},{},{}",
            self.range_start, self.range_end, self.lease
        );
        let _ = writeln!(out, "dhcp-option={},{}", OPTION_ROUTER, self.gateway);
        let _ = writeln!(out, "dhcp-option={},{}", OPTION_DNS, self.dns);
        let _ = writeln!(out, "server={}", self.upstream);
        out
    }
}

/// dnsmasq as a [`ConfigurableDaemon`].
pub struct DnsmasqDaemon<'a> {
    config: &'a AddressServiceConfig,
}

impl<'a> DnsmasqDaemon<'a> {
    pub fn new(config: &'a AddressServiceConfig) -> Self {
        Self { config }
    }
}

impl ConfigurableDaemon for DnsmasqDaemon<'_> {
    fn name(&self) -> &'static str {
        DAEMON
    }

    fn config_path(&self) -> &Path {
        &self.config.config_path
    }

    fn render(&self) -> String {
        self.config.render()
    }

    fn command(&self) -> Box<dyn ToolArgs> {
        Box::new(DnsmasqArgs {
            config_path: self.config.config_path.clone(),
        })
    }

    fn validate(&self) -> Result<(), LaunchError> {
        if self.config.lease.contains(char::is_whitespace) || self.config.lease.is_empty() {
            return Err(LaunchError::InvalidConfig {
                daemon: DAEMON,
                reason: format!("bad lease duration '{}'", self.config.lease),
            });
        }
        Ok(())
    }

    /// The DHCP options advertise the gateway, so the adapter must hold it.
    fn prepare(&self, host: &dyn Host) -> Result<(), LaunchError> {
        if !self.config.assign_gateway {
            return Ok(());
        }
        daemon::run_helper(
            host,
            DAEMON,
            &IpAddrFlushArgs {
                interface: self.config.adapter.clone(),
            },
        )?;
        daemon::run_helper(
            host,
            DAEMON,
            &IpAddrAddArgs {
                interface: self.config.adapter.clone(),
                address: self.config.gateway,
                prefix_len: self.config.prefix_len,
            },
        )
    }
}

/// Render dnsmasq's configuration and start it.
pub fn launch_dhcp_dns(
    host: &dyn Host,
    config: &AddressServiceConfig,
    startup: Duration,
) -> Result<DaemonHandle, LaunchError> {
    println!("[*] Setting up DNS and DHCP...");
    daemon::launch(host, &DnsmasqDaemon::new(config), startup)
}
