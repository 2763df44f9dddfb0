//! Network scanner
//!
//! Triggers an active scan on one adapter and returns the broadcast names it
//! saw. Two strategies cover the usual host tooling:
//!
//! - [`ScanStrategy::Iwlist`]: `iwlist <if> scan`, one `ESSID:"..."` marker per
//!   cell.
//! - [`ScanStrategy::Nmcli`]: `nmcli -f SSID device wifi list`, one name per
//!   row after the header.
//!
//! Names are trimmed and blank names dropped. Duplicates (the same SSID on
//! several BSSIDs) are kept in scan order.

use crate::adapters::Adapter;
use crate::error::DiscoveryError;
use crate::host::Host;
use crate::tool_traits::ToolArgs;
use crate::tools::{IwlistScanArgs, NmcliWifiListArgs};
use crate::types::ScanStrategy;
use tracing::info;

/// A broadcast network name observed during a scan.
pub type NetworkIdentifier = String;

/// Scan for nearby networks on `adapter`.
///
/// # Errors
///
/// - `ScanFailed` if the tool cannot be run or exits non-zero
/// - `NoNetworksFound` if nothing non-blank was parsed
pub fn scan(
    host: &dyn Host,
    adapter: &Adapter,
    strategy: ScanStrategy,
) -> Result<Vec<NetworkIdentifier>, DiscoveryError> {
    println!("[*] Scanning for available Wi-Fi networks on {}...", adapter.name);

    let tool: Box<dyn ToolArgs> = match strategy {
        ScanStrategy::Iwlist => Box::new(IwlistScanArgs {
            interface: adapter.name.clone(),
        }),
        ScanStrategy::Nmcli => Box::new(NmcliWifiListArgs {
            interface: adapter.name.clone(),
        }),
    };

    let scan_failed = |reason: String| DiscoveryError::ScanFailed {
        adapter: adapter.name.clone(),
        reason,
    };

    let output = host
        .run(tool.as_ref())
        .map_err(|e| scan_failed(format!("{:#}", e)))?;
    output
        .ensure_success(&tool.command_line())
        .map_err(scan_failed)?;

    let networks = match strategy {
        ScanStrategy::Iwlist => parse_iwlist(&output.stdout),
        ScanStrategy::Nmcli => parse_nmcli(&output.stdout),
    };

    if networks.is_empty() {
        return Err(DiscoveryError::NoNetworksFound {
            adapter: adapter.name.clone(),
        });
    }

    info!("Scan on {} found {} network(s)", adapter.name, networks.len());
    Ok(networks)
}

/// Parse `iwlist <if> scan` output.
///
/// ```text
///           Cell 01 - Address: AA:BB:CC:DD:EE:FF
///                     ESSID:"CoffeeShop"
/// ```
pub fn parse_iwlist(output: &str) -> Vec<NetworkIdentifier> {
    output
        .lines()
        .filter_map(|line| {
            let (_, value) = line.split_once("ESSID:")?;
            let value = value.trim();
            let value = value.strip_prefix('"').unwrap_or(value);
            let value = value.strip_suffix('"').unwrap_or(value);
            Some(value.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse `nmcli -f SSID device wifi list` output.
///
/// The first row is the column header; hidden networks show as `--`.
pub fn parse_nmcli(output: &str) -> Vec<NetworkIdentifier> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "--")
        .map(str::to_string)
        .collect()
}
