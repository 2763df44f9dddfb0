//! Access-point launcher (hostapd)

use crate::adapters::Adapter;
use crate::config_file::ApSettings;
use crate::daemon::{self, ConfigurableDaemon, DaemonHandle};
use crate::error::LaunchError;
use crate::host::Host;
use crate::tool_traits::ToolArgs;
use crate::tools::{AirmonCheckKillArgs, HostapdArgs};
use crate::types::HwMode;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DAEMON: &str = "hostapd";

/// Everything hostapd needs to impersonate one network on one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub adapter: String,
    pub ssid: String,
    pub driver: String,
    pub hw_mode: HwMode,
    pub channel: u8,
    /// 1 = open system authentication
    pub auth_algs: u8,
    /// 2 = WPA2 (RSN)
    pub wpa: u8,
    pub passphrase: String,
    pub key_mgmt: String,
    pub rsn_pairwise: String,
    pub config_path: PathBuf,
}

impl AccessPointConfig {
    /// WPA2-PSK/CCMP access point for `ssid` using the configured radio.
    pub fn new(adapter: &Adapter, ssid: &str, settings: &ApSettings) -> Self {
        Self {
            adapter: adapter.name.clone(),
            ssid: ssid.to_string(),
            driver: settings.driver.clone(),
            hw_mode: settings.hw_mode,
            channel: settings.channel,
            auth_algs: 1,
            wpa: 2,
            passphrase: settings.passphrase.clone(),
            key_mgmt: "WPA-PSK".to_string(),
            rsn_pairwise: "CCMP".to_string(),
            config_path: settings.config_path.clone(),
        }
    }

    /// hostapd.conf contents, one `key=value` per line in a fixed order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "interface={}", self.adapter);
        let _ = writeln!(out, "driver={}", self.driver);
        let _ = writeln!(out, "ssid={}", self.ssid);
        let _ = writeln!(out, "hw_mode={}", self.hw_mode);
        let _ = writeln!(out, "channel={}", self.channel);
        let _ = writeln!(out, "auth_algs={}", self.auth_algs);
        let _ = writeln!(out, "wpa={}", self.wpa);
        let _ = writeln!(out, "wpa_passphrase={}", self.passphrase);
        let _ = writeln!(out, "wpa_key_mgmt={}", self.key_mgmt);
        let _ = writeln!(out, "rsn_pairwise={}", self.rsn_pairwise);
        out
    }

    /// hostapd reads the file line by line; a newline in any value would
    /// inject extra directives.
    pub fn validate(&self) -> Result<(), LaunchError> {
        let invalid = |reason: String| LaunchError::InvalidConfig {
            daemon: DAEMON,
            reason,
        };

        if self.ssid.is_empty() || self.ssid.len() > 32 {
            return Err(invalid(format!(
                "SSID must be 1-32 bytes, got {}",
                self.ssid.len()
            )));
        }
        if self.ssid.chars().any(char::is_control) {
            return Err(invalid("SSID contains control characters".to_string()));
        }
        let passphrase_len = self.passphrase.chars().count();
        if !(8..=63).contains(&passphrase_len) {
            return Err(invalid("WPA passphrase must be 8-63 characters".to_string()));
        }
        if self.passphrase.chars().any(char::is_control) {
            return Err(invalid("WPA passphrase contains control characters".to_string()));
        }
        for (field, value) in [
            ("interface", &self.adapter),
            ("driver", &self.driver),
            ("wpa_key_mgmt", &self.key_mgmt),
            ("rsn_pairwise", &self.rsn_pairwise),
        ] {
            if !is_single_token(value) {
                return Err(invalid(format!("bad {} value {:?}", field, value)));
            }
        }
        Ok(())
    }
}

/// Non-empty, no whitespace, no control characters.
fn is_single_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// hostapd as a [`ConfigurableDaemon`].
pub struct HostapdDaemon<'a> {
    config: &'a AccessPointConfig,
}

impl<'a> HostapdDaemon<'a> {
    pub fn new(config: &'a AccessPointConfig) -> Self {
        Self { config }
    }
}

impl ConfigurableDaemon for HostapdDaemon<'_> {
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
        Box::new(HostapdArgs {
            config_path: self.config.config_path.clone(),
        })
    }

    fn validate(&self) -> Result<(), LaunchError> {
        self.config.validate()
    }

    /// hostapd refuses an adapter still held by wireless helpers.
    fn prepare(&self, host: &dyn Host) -> Result<(), LaunchError> {
        daemon::run_helper(host, DAEMON, &AirmonCheckKillArgs)
    }
}

/// Render hostapd's configuration and start it.
pub fn launch_ap(
    host: &dyn Host,
    config: &AccessPointConfig,
    startup: Duration,
) -> Result<DaemonHandle, LaunchError> {
    println!("[*] Setting up access point for SSID: {}", config.ssid);
    daemon::launch(host, &HostapdDaemon::new(config), startup)
}
