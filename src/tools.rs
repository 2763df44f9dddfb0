//! Type-safe arguments for the host tools the orchestrator drives.
//!
//! - `SystemctlArgs` for `systemctl start|stop <unit>`
//! - `IpLinkArgs`, `IpAddrFlushArgs`, `IpAddrAddArgs` for `ip`
//! - `IwconfigArgs` for the adapter inventory
//! - `IwlistScanArgs`, `NmcliWifiListArgs` for the two scan strategies
//! - `AirmonCheckKillArgs` for releasing the adapter from wireless helpers
//! - `HostapdArgs`, `DnsmasqArgs` for the two daemons

use crate::tool_traits::ToolArgs;
use crate::types::{LinkState, ServiceAction};
use std::net::Ipv4Addr;
use std::path::PathBuf;

// ============================================================================
// Service management
// ============================================================================

/// `systemctl <action> <unit>`
#[derive(Debug, Clone)]
pub struct SystemctlArgs {
    pub action: ServiceAction,
    pub unit: String,
}

impl ToolArgs for SystemctlArgs {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.action.to_string(), self.unit.clone()]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

// ============================================================================
// Link and address control
// ============================================================================

/// `ip link set dev <if> up|down`
#[derive(Debug, Clone)]
pub struct IpLinkArgs {
    pub interface: String,
    pub state: LinkState,
}

impl ToolArgs for IpLinkArgs {
    fn program(&self) -> &'static str {
        "ip"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "link".to_string(),
            "set".to_string(),
            "dev".to_string(),
            self.interface.clone(),
            self.state.to_string(),
        ]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

/// `ip -4 addr flush dev <if>`
#[derive(Debug, Clone)]
pub struct IpAddrFlushArgs {
    pub interface: String,
}

impl ToolArgs for IpAddrFlushArgs {
    fn program(&self) -> &'static str {
        "ip"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-4".to_string(),
            "addr".to_string(),
            "flush".to_string(),
            "dev".to_string(),
            self.interface.clone(),
        ]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

/// `ip addr add <address>/<prefix> dev <if>`
#[derive(Debug, Clone)]
pub struct IpAddrAddArgs {
    pub interface: String,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

impl ToolArgs for IpAddrAddArgs {
    fn program(&self) -> &'static str {
        "ip"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "addr".to_string(),
            "add".to_string(),
            format!("{}/{}", self.address, self.prefix_len),
            "dev".to_string(),
            self.interface.clone(),
        ]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// `iwconfig` with no arguments lists every interface.
#[derive(Debug, Clone, Default)]
pub struct IwconfigArgs;

impl ToolArgs for IwconfigArgs {
    fn program(&self) -> &'static str {
        "iwconfig"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }

    fn mutates_host(&self) -> bool {
        false
    }
}

/// `iwlist <if> scan`
#[derive(Debug, Clone)]
pub struct IwlistScanArgs {
    pub interface: String,
}

impl ToolArgs for IwlistScanArgs {
    fn program(&self) -> &'static str {
        "iwlist"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.interface.clone(), "scan".to_string()]
    }

    /// An active scan briefly retunes the radio but leaves no state behind.
    fn mutates_host(&self) -> bool {
        false
    }
}

/// `nmcli -f SSID device wifi list ifname <if> --rescan yes`
#[derive(Debug, Clone)]
pub struct NmcliWifiListArgs {
    pub interface: String,
}

impl ToolArgs for NmcliWifiListArgs {
    fn program(&self) -> &'static str {
        "nmcli"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-f".to_string(),
            "SSID".to_string(),
            "device".to_string(),
            "wifi".to_string(),
            "list".to_string(),
            "ifname".to_string(),
            self.interface.clone(),
            "--rescan".to_string(),
            "yes".to_string(),
        ]
    }

    fn mutates_host(&self) -> bool {
        false
    }
}

// ============================================================================
// Daemons and helpers
// ============================================================================

/// `airmon-ng check kill`
#[derive(Debug, Clone, Default)]
pub struct AirmonCheckKillArgs;

impl ToolArgs for AirmonCheckKillArgs {
    fn program(&self) -> &'static str {
        "airmon-ng"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["check".to_string(), "kill".to_string()]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

/// `hostapd <config>` (foreground)
#[derive(Debug, Clone)]
pub struct HostapdArgs {
    pub config_path: PathBuf,
}

impl ToolArgs for HostapdArgs {
    fn program(&self) -> &'static str {
        "hostapd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.config_path.display().to_string()]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}

/// `dnsmasq --conf-file=<config> --keep-in-foreground`
#[derive(Debug, Clone)]
pub struct DnsmasqArgs {
    pub config_path: PathBuf,
}

impl ToolArgs for DnsmasqArgs {
    fn program(&self) -> &'static str {
        "dnsmasq"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            format!("--conf-file={}", self.config_path.display()),
            "--keep-in-foreground".to_string(),
        ]
    }

    fn mutates_host(&self) -> bool {
        true
    }
}
