//! twinportal library
//!
//! Access-point lifecycle orchestration: pick an adapter and a network to
//! impersonate, take the adapter away from host network management, run
//! hostapd and dnsmasq on it, serve a captive portal, and put network
//! management back however the run ends.

pub mod access_point;
pub mod adapters;
pub mod address_service;
pub mod cli;
pub mod config_file;
pub mod daemon;
pub mod error;
pub mod host;
pub mod management;
pub mod orchestrator;
pub mod portal;
pub mod process_guard;
pub mod quiescer;
pub mod run_state;
pub mod sanity;
pub mod scanner;
pub mod selection;
pub mod shutdown;
pub mod tool_traits;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use access_point::{AccessPointConfig, HostapdDaemon, launch_ap};
pub use adapters::{Adapter, list_adapters};
pub use address_service::{AddressServiceConfig, DnsmasqDaemon, launch_dhcp_dns};
pub use config_file::TwinConfig;
pub use daemon::{ConfigurableDaemon, DaemonHandle};
pub use error::{
    DiscoveryError, LaunchError, PortalError, QuiesceError, SelectionError, TwinError,
};
pub use host::{Host, ProcessInfo, Supervised, SystemHost, ToolOutput};
pub use management::{ManagementLease, Restoration};
pub use orchestrator::{Orchestrator, RunReport, exit_code};
pub use portal::{AxumPortal, CapturedCredential, CredentialSink, LogSink, MemorySink, PortalServer};
pub use quiescer::Quiescer;
pub use run_state::{RunContext, RunStage, RunTransitionError};
pub use scanner::NetworkIdentifier;
pub use selection::{Selector, StdinSelector, parse_selection};
pub use shutdown::Shutdown;
pub use tool_traits::ToolArgs;
pub use types::{HwMode, LinkState, QuiesceStep, ScanStrategy, ServiceAction};
