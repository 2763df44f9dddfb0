use crate::types::ScanStrategy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// twinportal - Access point impersonation with a captive portal
#[derive(Parser)]
#[command(name = "twinportal")]
#[command(about = "Stand up an impersonating access point with DHCP/DNS and a captive portal")]
#[command(version)]
pub struct Cli {
    /// Verbose logging (debug level unless RUST_LOG says otherwise)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the access point and captive portal (default)
    Run(RunOptions),
    /// List wireless adapters
    Adapters,
    /// Scan for nearby networks on one adapter
    Scan {
        /// Adapter to scan with (e.g., wlan0)
        #[arg(short, long)]
        interface: String,

        /// Scan tool to use (iwlist or nmcli)
        #[arg(long)]
        scan_strategy: Option<ScanStrategy>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Write the default configuration to a file
    WriteConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunOptions {
    /// Adapter to use instead of prompting
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Network name to impersonate; skips the scan
    #[arg(short, long)]
    pub ssid: Option<String>,

    /// WPA2 passphrase for the access point
    #[arg(long)]
    pub passphrase: Option<String>,

    /// Radio channel for the access point
    #[arg(short, long)]
    pub channel: Option<u8>,

    /// Scan tool to use (iwlist or nmcli)
    #[arg(long)]
    pub scan_strategy: Option<ScanStrategy>,

    /// Path to configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the root and binary checks
    #[arg(long)]
    pub skip_preflight: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
