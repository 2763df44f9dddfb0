//! Wireless adapter inventory
//!
//! Lists the host's interfaces through `iwconfig` and keeps the ones that
//! advertise an 802.11 driver signature.
//!
//! # Failure Mode
//!
//! A failing query (missing binary, non-zero exit) is not an error of its own:
//! it yields an empty inventory, which [`list_adapters`] reports as
//! [`DiscoveryError::NoAdaptersFound`] like any other empty result.

use crate::error::DiscoveryError;
use crate::host::Host;
use crate::tools::IwconfigArgs;
use std::fmt;
use tracing::{info, warn};

/// Marker `iwconfig` prints on the header line of wireless interfaces
const WIRELESS_SIGNATURE: &str = "IEEE 802.11";

/// A network interface on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Adapter {
    /// Interface name (e.g. `wlan0`)
    pub name: String,
    /// Whether the interface advertises an 802.11 driver
    pub wireless: bool,
}

impl Adapter {
    pub fn wireless(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wireless: true,
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// List wireless-capable adapters.
///
/// # Errors
///
/// `NoAdaptersFound` if the filtered inventory is empty, including when the
/// query itself failed.
pub fn list_adapters(host: &dyn Host) -> Result<Vec<Adapter>, DiscoveryError> {
    let adapters: Vec<Adapter> = query_interfaces(host)
        .into_iter()
        .filter(|adapter| adapter.wireless)
        .collect();

    if adapters.is_empty() {
        return Err(DiscoveryError::NoAdaptersFound);
    }

    info!(
        "Wireless adapters: {}",
        adapters.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(adapters)
}

/// Run `iwconfig` and parse every interface it reports.
fn query_interfaces(host: &dyn Host) -> Vec<Adapter> {
    match host.run(&IwconfigArgs) {
        Ok(output) if output.success => parse_iwconfig(&output.stdout),
        Ok(output) => {
            warn!(
                "iwconfig exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            );
            Vec::new()
        }
        Err(e) => {
            warn!("Interface query failed: {:#}", e);
            Vec::new()
        }
    }
}

/// Parse `iwconfig` output.
///
/// Each interface block starts with an unindented line whose first token is
/// the interface name; continuation lines are indented:
///
/// ```text
/// wlan0     IEEE 802.11  ESSID:off/any
///           Mode:Managed  Access Point: Not-Associated   Tx-Power=20 dBm
/// eth0      no wireless extensions.
/// ```
pub fn parse_iwconfig(output: &str) -> Vec<Adapter> {
    output
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let name = line.split_whitespace().next()?;
            Some(Adapter {
                name: name.to_string(),
                wireless: line.contains(WIRELESS_SIGNATURE),
            })
        })
        .collect()
}
