//! twinportal - Main entry point

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use twinportal::cli::{Cli, Commands, RunOptions};
use twinportal::config_file::TwinConfig;
use twinportal::host::{Host, SystemHost};
use twinportal::management::Restoration;
use twinportal::error::TwinError;
use twinportal::orchestrator::{Orchestrator, exit_code};
use twinportal::portal::{AxumPortal, LogSink};
use twinportal::selection::StdinSelector;
use twinportal::shutdown::Shutdown;
use twinportal::types::ScanStrategy;
use twinportal::{adapters, process_guard, sanity, scanner};

/// Initialize tracing; RUST_LOG wins over the verbosity flag
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    debug!("CLI arguments parsed");

    let code = match cli.command {
        None => run(RunOptions::default()),
        Some(Commands::Run(opts)) => run(opts),
        Some(Commands::Adapters) => list_adapters(),
        Some(Commands::Scan {
            interface,
            scan_strategy,
        }) => scan(&interface, scan_strategy.unwrap_or_default()),
        Some(Commands::Validate { config }) => validate(&config),
        Some(Commands::WriteConfig { path }) => write_config(&path),
    };

    std::process::exit(code);
}

/// Load the configuration file (or defaults) and apply command-line overrides
fn build_config(opts: &RunOptions) -> Result<TwinConfig, TwinError> {
    let mut config = match &opts.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            TwinConfig::load_from_file(path).map_err(|e| TwinError::config(format!("{:#}", e)))?
        }
        None => TwinConfig::default(),
    };

    if let Some(passphrase) = &opts.passphrase {
        config.access_point.passphrase = passphrase.clone();
    }
    if let Some(channel) = opts.channel {
        config.access_point.channel = channel;
    }
    if let Some(strategy) = opts.scan_strategy {
        config.host.scan_strategy = strategy;
    }

    config
        .validate()
        .map_err(|e| TwinError::config(format!("{:#}", e)))?;
    Ok(config)
}

/// A run without an interrupt handler could leave networking down on Ctrl-C.
fn require_interrupt_handler(installed: std::io::Result<()>) -> Result<(), i32> {
    installed.map_err(|e| {
        error!("Failed to install interrupt handler: {}", e);
        eprintln!("✗ Failed to install interrupt handler: {}", e);
        1
    })
}

fn run(opts: RunOptions) -> i32 {
    let config = match build_config(&opts) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("✗ {}", e);
            return e.exit_code();
        }
    };

    if opts.skip_preflight {
        warn!("Pre-flight checks skipped");
    } else {
        sanity::run_preflight_checks(config.host.scan_strategy);
    }

    let host: Arc<dyn Host> = Arc::new(SystemHost);
    let restoration = Restoration::new(Arc::clone(&host), config.host.management_service.clone());
    let shutdown = Shutdown::new();

    // Nothing is suspended yet, so refusing to run is safe here
    if let Err(code) = require_interrupt_handler(process_guard::install_interrupt_handler(
        Arc::clone(&shutdown),
        Arc::clone(&restoration),
        process_guard::INTERRUPT_FALLBACK,
    )) {
        return code;
    }

    let orchestrator = Orchestrator::new(host, &config, Arc::clone(&restoration), Arc::clone(&shutdown))
        .with_interface(opts.interface)
        .with_ssid(opts.ssid);

    let mut selector = StdinSelector::new(shutdown);
    let result = orchestrator.run(&mut selector, &AxumPortal, Arc::new(LogSink));
    match &result {
        Ok(report) => info!(
            "Portal for {} on {} stopped ({})",
            report.ssid, report.adapter, report.ended_at
        ),
        Err(e) if e.is_interrupted() => println!("[*] Interrupted"),
        Err(e) => eprintln!("✗ {}", e),
    }
    if restoration.succeeded() != Some(true) {
        eprintln!(
            "✗ {} could not be restarted; start it manually",
            restoration.service()
        );
    }
    exit_code(&result, &restoration)
}

fn list_adapters() -> i32 {
    match adapters::list_adapters(&SystemHost) {
        Ok(found) => {
            println!("[*] Wireless adapters:");
            for (i, adapter) in found.iter().enumerate() {
                println!("{}. {}", i + 1, adapter);
            }
            0
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            1
        }
    }
}

fn scan(interface: &str, strategy: ScanStrategy) -> i32 {
    let adapter = adapters::Adapter::wireless(interface);
    match scanner::scan(&SystemHost, &adapter, strategy) {
        Ok(networks) => {
            println!("[*] Available Wi-Fi networks:");
            for (i, ssid) in networks.iter().enumerate() {
                println!("{}. {}", i + 1, ssid);
            }
            0
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            1
        }
    }
}

fn validate(path: &Path) -> i32 {
    info!("Validating configuration file: {:?}", path);
    match TwinConfig::load_from_file(path) {
        Ok(config) => match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration file is valid: {:?}", path);
                0
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                1
            }
        },
        Err(e) => {
            error!("Failed to load configuration file: {:#}", e);
            eprintln!("✗ Failed to load configuration file: {:#}", e);
            1
        }
    }
}

fn write_config(path: &Path) -> i32 {
    match TwinConfig::default().save_to_file(path) {
        Ok(()) => {
            println!("✓ Default configuration written to {:?}", path);
            0
        }
        Err(e) => {
            eprintln!("✗ {:#}", e);
            1
        }
    }
}
