//! Configuration file handling for saving and loading run settings.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes. The defaults reproduce the stock hostapd/dnsmasq setup: channel 6
//! 802.11g with WPA2-PSK, DHCP 192.168.1.10-100 with the gateway at
//! 192.168.1.1, upstream resolver 8.8.8.8, portal on port 80.

use crate::types::{HwMode, ScanStrategy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Access-point daemon settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApSettings {
    pub config_path: PathBuf,
    pub driver: String,
    pub hw_mode: HwMode,
    pub channel: u8,
    pub passphrase: String,
}

impl Default for ApSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/hostapd/hostapd.conf"),
            driver: "nl80211".to_string(),
            hw_mode: HwMode::G,
            channel: 6,
            passphrase: "password123".to_string(),
        }
    }
}

/// DHCP/DNS daemon settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressSettings {
    pub config_path: PathBuf,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    pub lease: String,
    pub gateway: Ipv4Addr,
    pub prefix_len: u8,
    pub dns: Ipv4Addr,
    pub upstream: Ipv4Addr,
    /// Assign `gateway/prefix_len` to the adapter before dnsmasq starts
    pub assign_gateway: bool,
}

impl Default for AddressSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/dnsmasq.conf"),
            range_start: Ipv4Addr::new(192, 168, 1, 10),
            range_end: Ipv4Addr::new(192, 168, 1, 100),
            lease: "12h".to_string(),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            prefix_len: 24,
            dns: Ipv4Addr::new(192, 168, 1, 1),
            upstream: Ipv4Addr::new(8, 8, 8, 8),
            assign_gateway: true,
        }
    }
}

/// Host integration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub management_service: String,
    pub supplicant_process: String,
    pub scan_strategy: ScanStrategy,
    /// Pause after killing supplicants, in milliseconds
    pub settle_millis: u64,
    /// How long a daemon must survive after spawn, in milliseconds
    pub daemon_startup_millis: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            management_service: "NetworkManager".to_string(),
            supplicant_process: "wpa_supplicant".to_string(),
            scan_strategy: ScanStrategy::Iwlist,
            settle_millis: 1000,
            daemon_startup_millis: 500,
        }
    }
}

impl HostSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }

    pub fn daemon_startup(&self) -> Duration {
        Duration::from_millis(self.daemon_startup_millis)
    }
}

/// Captive portal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub port: u16,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self { port: 80 }
    }
}

/// Complete run configuration that can be saved/loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    pub access_point: ApSettings,
    pub address_service: AddressSettings,
    pub host: HostSettings,
    pub portal: PortalSettings,
}

impl TwinConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Address the portal binds to (the gateway)
    pub fn portal_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(
            self.address_service.gateway,
            self.portal.port,
        ))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let ap = &self.access_point;
        let passphrase_len = ap.passphrase.chars().count();
        if !(8..=63).contains(&passphrase_len) {
            anyhow::bail!("WPA passphrase must be 8-63 characters long");
        }
        if ap.passphrase.chars().any(|c| c.is_control()) {
            anyhow::bail!("WPA passphrase cannot contain control characters");
        }
        let channel_ok = match ap.hw_mode {
            HwMode::A => (36..=177).contains(&ap.channel),
            HwMode::B | HwMode::G => (1..=14).contains(&ap.channel),
        };
        if !channel_ok {
            anyhow::bail!("Channel {} is not valid for hw_mode={}", ap.channel, ap.hw_mode);
        }
        if ap.driver.trim().is_empty() {
            anyhow::bail!("Access point driver must be specified");
        }
        if ap.driver.chars().any(|c| c.is_whitespace() || c.is_control()) {
            anyhow::bail!("Access point driver must be a single name like nl80211");
        }

        let dhcp = &self.address_service;
        if !(8..=30).contains(&dhcp.prefix_len) {
            anyhow::bail!("Prefix length must be between 8 and 30");
        }
        let mask = u32::MAX << (32 - u32::from(dhcp.prefix_len));
        let network = u32::from(dhcp.gateway) & mask;
        for (name, addr) in [("range_start", dhcp.range_start), ("range_end", dhcp.range_end)] {
            if u32::from(addr) & mask != network {
                anyhow::bail!(
                    "DHCP {} {} is outside the gateway subnet {}/{}",
                    name,
                    addr,
                    dhcp.gateway,
                    dhcp.prefix_len
                );
            }
        }
        if u32::from(dhcp.range_start) > u32::from(dhcp.range_end) {
            anyhow::bail!("DHCP range start must not be after range end");
        }
        let gateway = u32::from(dhcp.gateway);
        if (u32::from(dhcp.range_start)..=u32::from(dhcp.range_end)).contains(&gateway) {
            anyhow::bail!("Gateway {} must not be inside the DHCP range", dhcp.gateway);
        }
        if dhcp.lease.trim().is_empty() || dhcp.lease.contains(char::is_whitespace) {
            anyhow::bail!("DHCP lease duration must be a single token like 12h");
        }

        if self.host.management_service.trim().is_empty() {
            anyhow::bail!("Management service name must be specified");
        }
        if self.host.supplicant_process.trim().is_empty() {
            anyhow::bail!("Supplicant process name must be specified");
        }

        if self.portal.port == 0 {
            anyhow::bail!("Portal port must be non-zero");
        }

        Ok(())
    }
}
