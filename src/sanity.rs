//! Pre-flight sanity checks for runtime environment
//!
//! Before a run touches the host:
//! - Required runtime binaries are present
//! - Running with root privileges (EUID 0)
//!
//! If any check fails, the program exits with a clear error message before
//! network management is suspended.

use crate::process_guard::CommandProcessGroup;
use crate::types::ScanStrategy;
use std::process::Command;
use tracing::{debug, info, warn};

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Binaries every run needs regardless of scan strategy
const REQUIRED_BINARIES: &[&str] = &[
    "hostapd",   // Access point
    "dnsmasq",   // DHCP and DNS
    "ip",        // Link state and addressing (iproute2)
    "systemctl", // Connection-management service
    "iwconfig",  // Adapter inventory (wireless-tools)
    "airmon-ng", // Releases the adapter before hostapd (aircrack-ng)
];

/// Binaries a run needs with `strategy`
pub fn required_binaries(strategy: ScanStrategy) -> Vec<&'static str> {
    let mut binaries = REQUIRED_BINARIES.to_vec();
    if !binaries.contains(&strategy.binary()) {
        binaries.push(strategy.binary());
    }
    binaries
}

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .in_new_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment(strategy: ScanStrategy) -> SanityCheckResult {
    let missing = required_binaries(strategy)
        .into_iter()
        .filter(|binary| !binary_exists(binary))
        .map(str::to_string)
        .collect();

    SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    }
}

/// Print a framed error to stderr and exit
pub fn print_error_and_exit(result: &SanityCheckResult) -> ! {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║              twinportal - Pre-flight Check Failed                ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    if !result.is_root {
        eprintln!("❌ ERROR: Root privileges required");
        eprintln!("   Stopping services, killing supplicants and binding port 80 need root.");
        eprintln!();
        eprintln!("   Solution: Run with sudo or as root user:");
        eprintln!("     sudo twinportal run");
        eprintln!();
    }

    if !result.missing_binaries.is_empty() {
        eprintln!("❌ ERROR: Missing required binaries");
        eprintln!();
        for binary in &result.missing_binaries {
            eprintln!("   • {} (package: {})", binary, package_for_binary(binary));
        }
        eprintln!();
    }

    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║  Fix the above issues and try again.                             ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    std::process::exit(1);
}

/// Usual distribution package providing `binary`
fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "hostapd" => "hostapd",
        "dnsmasq" => "dnsmasq",
        "ip" => "iproute2",
        "systemctl" => "systemd",
        "iwconfig" | "iwlist" => "wireless-tools",
        "airmon-ng" => "aircrack-ng",
        "nmcli" => "networkmanager",
        _ => "unknown",
    }
}

/// Skip root check (for development/testing)
/// Set TWINPORTAL_SKIP_ROOT_CHECK=1 to skip
pub fn should_skip_root_check() -> bool {
    std::env::var("TWINPORTAL_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Verify the environment for a run and exit if anything is missing
pub fn run_preflight_checks(strategy: ScanStrategy) {
    debug!("Running pre-flight sanity checks...");

    let mut result = verify_environment(strategy);

    if should_skip_root_check() {
        warn!("Root check skipped (TWINPORTAL_SKIP_ROOT_CHECK=1)");
        result.is_root = true;
    }

    if !result.is_ok() {
        print_error_and_exit(&result);
    }

    info!("Pre-flight checks passed");
}
