//! Orchestrator integration tests
//!
//! Whole runs against a recording host. Every test checks that the
//! connection-management service is started exactly once, whatever the path.

mod common;

use common::{
    DNSMASQ_CONF, Event, FakeHost, FakePortal, HOSTAPD_CONF, PortalBehavior, START_MANAGEMENT,
    STOP_MANAGEMENT, ScriptedSelector,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use twinportal::config_file::TwinConfig;
use twinportal::error::{DiscoveryError, LaunchError, QuiesceError, SelectionError, TwinError};
use twinportal::host::{Host, ProcessInfo};
use twinportal::management::Restoration;
use twinportal::orchestrator::{Orchestrator, RunReport, exit_code};
use twinportal::portal::MemorySink;
use twinportal::run_state::RunStage;
use twinportal::shutdown::Shutdown;
use twinportal::types::QuiesceStep;

struct Harness {
    host: Arc<FakeHost>,
    restoration: Arc<Restoration>,
    shutdown: Arc<Shutdown>,
    config: TwinConfig,
}

impl Harness {
    fn new(host: FakeHost) -> Self {
        let host = Arc::new(host);
        let dyn_host: Arc<dyn Host> = host.clone();
        Self {
            host,
            restoration: Restoration::new(dyn_host, "NetworkManager"),
            shutdown: Shutdown::new(),
            config: TwinConfig::default(),
        }
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        let dyn_host: Arc<dyn Host> = self.host.clone();
        Orchestrator::new(
            dyn_host,
            &self.config,
            Arc::clone(&self.restoration),
            Arc::clone(&self.shutdown),
        )
    }

    fn run(&self, answers: &[&str], portal: &FakePortal) -> Result<RunReport, TwinError> {
        let mut selector = ScriptedSelector::new(answers);
        self.orchestrator()
            .run(&mut selector, portal, Arc::new(MemorySink::new()))
    }

    fn restarts(&self) -> usize {
        self.host.count_runs(START_MANAGEMENT)
    }

    /// Last systemctl command issued for the management service
    fn last_management_command(&self) -> Option<String> {
        self.host
            .commands()
            .into_iter()
            .filter(|c| c == START_MANAGEMENT || c == STOP_MANAGEMENT)
            .last()
    }

    fn terminate_position(&self, program: &str) -> usize {
        self.host
            .position(|e| matches!(e, Event::Terminate(name) if name == program))
            .unwrap_or_else(|| panic!("{} was never stopped", program))
    }
}

/// Wait until `portal` has been asked to serve.
fn wait_for_serving(portal: &FakePortal) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while portal.served_on.lock().unwrap().is_none() {
        assert!(Instant::now() < deadline, "portal never started");
        thread::sleep(Duration::from_millis(10));
    }
}

fn coffee_shop_host() -> FakeHost {
    FakeHost::new()
        .with_adapters(&["wlan0"])
        .with_scan("wlan0", &["CoffeeShop", "CoffeeShop_5G"])
}

// =============================================================================
// Full runs
// =============================================================================

#[test]
fn test_happy_path_impersonates_first_network() {
    let harness = Harness::new(coffee_shop_host());
    let portal = FakePortal::new(PortalBehavior::Return);

    let report = harness.run(&["1", "1"], &portal).expect("run should succeed");

    assert_eq!(report.adapter, "wlan0");
    assert_eq!(report.ssid, "CoffeeShop");
    assert_eq!(report.ended_at, RunStage::PortalServing);

    let hostapd_conf = harness.host.written(HOSTAPD_CONF).expect("hostapd.conf written");
    assert!(hostapd_conf.contains("ssid=CoffeeShop\n"));
    assert!(hostapd_conf.starts_with("interface=wlan0\n"));

    let dnsmasq_conf = harness.host.written(DNSMASQ_CONF).expect("dnsmasq.conf written");
    assert!(dnsmasq_conf.contains("dhcp-range=192.168.1.10,192.168.1.100,12h\n"));

    assert_eq!(
        harness.host.spawned(),
        vec![
            "hostapd /etc/hostapd/hostapd.conf".to_string(),
            "dnsmasq --conf-file=/etc/dnsmasq.conf --keep-in-foreground".to_string(),
        ]
    );
    assert_eq!(
        *portal.served_on.lock().unwrap(),
        Some("192.168.1.1:80".parse().unwrap())
    );
    assert_eq!(harness.restarts(), 1);
    assert!(harness.restoration.has_run());
}

#[test]
fn test_selection_prompts_list_adapters_then_networks() {
    let harness = Harness::new(coffee_shop_host());
    let portal = FakePortal::new(PortalBehavior::Return);
    let mut selector = ScriptedSelector::new(&["1", "2"]);

    let report = harness
        .orchestrator()
        .run(&mut selector, &portal, Arc::new(MemorySink::new()))
        .unwrap();

    assert_eq!(report.ssid, "CoffeeShop_5G");
    assert_eq!(selector.prompts.len(), 2);
    assert_eq!(selector.prompts[0].1, vec!["wlan0".to_string()]);
    assert_eq!(
        selector.prompts[1].1,
        vec!["CoffeeShop".to_string(), "CoffeeShop_5G".to_string()]
    );
}

#[test]
fn test_management_stopped_before_hostapd_config_written() {
    let harness = Harness::new(coffee_shop_host());
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    let stop = harness.host.run_position(STOP_MANAGEMENT).expect("management stopped");
    let write = harness.host.write_position(HOSTAPD_CONF).expect("config written");
    assert!(stop < write, "stop at {}, write at {}", stop, write);
}

#[test]
fn test_daemons_stopped_before_management_restarted() {
    let harness = Harness::new(coffee_shop_host());
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    let restart = harness.host.run_position(START_MANAGEMENT).unwrap();
    for daemon in ["hostapd", "dnsmasq"] {
        let stopped = harness
            .host
            .position(|e| matches!(e, Event::Terminate(name) if name == daemon))
            .unwrap_or_else(|| panic!("{} never stopped", daemon));
        assert!(stopped < restart, "{} stopped after restart", daemon);
    }
}

#[test]
fn test_quiesce_sequence_order() {
    let harness = Harness::new(coffee_shop_host());
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    let commands = harness.host.commands();
    let index = |line: &str| {
        commands
            .iter()
            .position(|c| c == line)
            .unwrap_or_else(|| panic!("missing {}", line))
    };
    assert!(index(STOP_MANAGEMENT) < index("ip link set dev wlan0 down"));
    assert!(index("ip link set dev wlan0 down") < index("ip link set dev wlan0 up"));
    assert!(index("ip link set dev wlan0 up") < index("airmon-ng check kill"));
}

#[test]
fn test_gateway_assigned_before_dnsmasq_spawn() {
    let harness = Harness::new(coffee_shop_host());
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    let flush = harness.host.run_position("ip -4 addr flush dev wlan0").unwrap();
    let assign = harness
        .host
        .run_position("ip addr add 192.168.1.1/24 dev wlan0")
        .unwrap();
    let spawn = harness
        .host
        .position(|e| matches!(e, Event::Spawn(line) if line.starts_with("dnsmasq")))
        .unwrap();
    assert!(flush < assign && assign < spawn);
}

#[test]
fn test_gateway_assignment_can_be_disabled() {
    let mut harness = Harness::new(coffee_shop_host());
    harness.config.address_service.assign_gateway = false;
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    assert!(harness.host.run_position("ip -4 addr flush dev wlan0").is_none());
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_only_supplicants_on_chosen_adapter_are_killed() {
    let host = coffee_shop_host().with_processes(vec![
        ProcessInfo {
            pid: 4242,
            cmdline: vec![
                "/usr/bin/wpa_supplicant".to_string(),
                "-i".to_string(),
                "wlan0".to_string(),
            ],
        },
        ProcessInfo {
            pid: 4343,
            cmdline: vec!["wpa_supplicant".to_string(), "-iwlan1".to_string()],
        },
        ProcessInfo {
            pid: 1,
            cmdline: vec!["/sbin/init".to_string()],
        },
    ]);
    let harness = Harness::new(host);
    harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap();

    let kills: Vec<u32> = harness
        .host
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Kill(pid) => Some(pid),
            _ => None,
        })
        .collect();
    assert_eq!(kills, vec![4242]);
}

// =============================================================================
// Failure scenarios
// =============================================================================

#[test]
fn test_empty_inventory_fails_and_restores_once() {
    let harness = Harness::new(FakeHost::new().with_adapters(&[]));

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(err, TwinError::Discovery(DiscoveryError::NoAdaptersFound)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.restarts(), 1);
    assert_eq!(harness.host.count_runs(STOP_MANAGEMENT), 0);
}

#[test]
fn test_out_of_range_network_choice_fails_and_restores_once() {
    let harness = Harness::new(coffee_shop_host());

    let err = harness
        .run(&["1", "99"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Selection(SelectionError::OutOfRange { choice: 99, len: 2 })
    ));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.restarts(), 1);
    assert!(harness.host.spawned().is_empty());
}

#[test]
fn test_link_down_failure_never_launches_hostapd() {
    let host = coffee_shop_host().fail(
        "ip link set dev wlan0 down",
        2,
        "RTNETLINK answers: Operation not permitted",
    );
    let harness = Harness::new(host);

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    match &err {
        TwinError::Quiesce(QuiesceError { step, reason }) => {
            assert_eq!(*step, QuiesceStep::LinkDown);
            assert!(reason.contains("Operation not permitted"));
        }
        other => panic!("expected quiesce error, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
    assert!(harness.host.spawned().is_empty());
    assert!(harness.host.written(HOSTAPD_CONF).is_none());
    assert!(harness.host.run_position("ip link set dev wlan0 up").is_none());
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_stop_management_failure_still_restores_once() {
    let host = coffee_shop_host().fail(STOP_MANAGEMENT, 5, "Unit NetworkManager.service not loaded.");
    let harness = Harness::new(host);

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Quiesce(QuiesceError {
            step: QuiesceStep::StopManagement,
            ..
        })
    ));
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_scan_with_no_networks_fails() {
    let host = FakeHost::new()
        .with_adapters(&["wlan0"])
        .with_scan("wlan0", &["", "   "]);
    let harness = Harness::new(host);

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Discovery(DiscoveryError::NoNetworksFound { .. })
    ));
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_hostapd_early_exit_aborts_before_dnsmasq() {
    let host = coffee_shop_host().exit_on_spawn(
        "hostapd",
        1,
        "Could not set channel for kernel driver",
    );
    let harness = Harness::new(host);

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    match &err {
        TwinError::Launch(LaunchError::Exited {
            daemon,
            code,
            stderr,
        }) => {
            assert_eq!(*daemon, "hostapd");
            assert_eq!(*code, 1);
            assert!(stderr.contains("Could not set channel"));
        }
        other => panic!("expected launch error, got {:?}", other),
    }
    assert_eq!(harness.host.spawned().len(), 1);
    assert!(harness.host.written(DNSMASQ_CONF).is_none());
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_dnsmasq_spawn_failure_stops_hostapd() {
    let host = coffee_shop_host().unavailable(
        "dnsmasq --conf-file=/etc/dnsmasq.conf --keep-in-foreground",
        "No such file or directory",
    );
    let harness = Harness::new(host);

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Launch(LaunchError::Spawn {
            daemon: "dnsmasq",
            ..
        })
    ));
    assert!(
        harness
            .host
            .position(|e| matches!(e, Event::Terminate(name) if name == "hostapd"))
            .is_some()
    );
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_portal_failure_is_fatal() {
    let harness = Harness::new(coffee_shop_host());

    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Fail))
        .unwrap_err();

    assert!(matches!(err, TwinError::Portal(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_closed_input_is_interrupt_and_restores_once() {
    let harness = Harness::new(coffee_shop_host());

    let err = harness
        .run(&["1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(err.exit_code(), 0);
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_panic_in_portal_still_restores_once() {
    let harness = Harness::new(coffee_shop_host());
    let portal = FakePortal::new(PortalBehavior::Panic);

    let outcome = catch_unwind(AssertUnwindSafe(|| harness.run(&["1", "1"], &portal)));

    assert!(outcome.is_err(), "portal panic should propagate");
    assert_eq!(harness.restarts(), 1);
    assert!(
        harness
            .host
            .position(|e| matches!(e, Event::Terminate(name) if name == "hostapd"))
            .is_some()
    );
}

#[test]
fn test_restore_before_quiesce_refuses_to_stop_management() {
    let harness = Harness::new(coffee_shop_host());

    // Restoration already ran on another path
    assert!(harness.restoration.restore());
    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Quiesce(QuiesceError {
            step: QuiesceStep::StopManagement,
            ..
        })
    ));
    assert_eq!(harness.host.count_runs(STOP_MANAGEMENT), 0);
    assert_eq!(harness.last_management_command().as_deref(), Some(START_MANAGEMENT));
    assert!(harness.host.spawned().is_empty());
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_fallback_restore_during_shutdown_is_interrupt() {
    let harness = Harness::new(coffee_shop_host());

    harness.shutdown.request();
    assert!(harness.restoration.restore());
    let err = harness
        .run(&["1", "1"], &FakePortal::new(PortalBehavior::Return))
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(harness.host.count_runs(STOP_MANAGEMENT), 0);
    assert_eq!(harness.last_management_command().as_deref(), Some(START_MANAGEMENT));
    assert_eq!(harness.restarts(), 1);
}

// =============================================================================
// Interrupts
// =============================================================================

#[test]
fn test_interrupt_while_serving_stops_daemons_before_restore() {
    let harness = Harness::new(coffee_shop_host());
    let portal = FakePortal::new(PortalBehavior::AwaitShutdown);

    let result = thread::scope(|scope| {
        let run = scope.spawn(|| harness.run(&["1", "1"], &portal));
        wait_for_serving(&portal);
        assert!(!harness.restoration.has_run());
        harness.shutdown.request();
        run.join().unwrap()
    });

    let err = result.as_ref().unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(exit_code(&result, &harness.restoration), 0);

    let dnsmasq_stopped = harness.terminate_position("dnsmasq");
    let hostapd_stopped = harness.terminate_position("hostapd");
    let restarted = harness.host.run_position(START_MANAGEMENT).unwrap();
    assert!(dnsmasq_stopped < hostapd_stopped);
    assert!(hostapd_stopped < restarted);
    assert_eq!(harness.restarts(), 1);
    assert_eq!(harness.last_management_command().as_deref(), Some(START_MANAGEMENT));
}

#[test]
fn test_shutdown_before_quiesce_never_stops_management() {
    let harness = Harness::new(coffee_shop_host());
    harness.shutdown.request();

    let result = harness.run(&["1", "1"], &FakePortal::new(PortalBehavior::Return));

    assert!(result.as_ref().unwrap_err().is_interrupted());
    assert_eq!(harness.host.count_runs(STOP_MANAGEMENT), 0);
    assert!(harness.host.spawned().is_empty());
    assert_eq!(harness.restarts(), 1);
    assert_eq!(exit_code(&result, &harness.restoration), 0);
}

// =============================================================================
// Exit codes
// =============================================================================

#[test]
fn test_exit_code_zero_after_clean_run() {
    let harness = Harness::new(coffee_shop_host());
    let result = harness.run(&["1", "1"], &FakePortal::new(PortalBehavior::Return));
    assert_eq!(exit_code(&result, &harness.restoration), 0);
}

#[test]
fn test_closed_input_with_failed_restore_exits_one() {
    let harness = Harness::new(coffee_shop_host().fail(START_MANAGEMENT, 1, "Job failed"));

    let result = harness.run(&["1"], &FakePortal::new(PortalBehavior::Return));

    assert!(result.as_ref().unwrap_err().is_interrupted());
    assert_eq!(harness.restoration.succeeded(), Some(false));
    assert_eq!(exit_code(&result, &harness.restoration), 1);
}

#[test]
fn test_portal_return_with_failed_restore_exits_one() {
    let harness = Harness::new(coffee_shop_host().fail(START_MANAGEMENT, 1, "Job failed"));

    let result = harness.run(&["1", "1"], &FakePortal::new(PortalBehavior::Return));

    assert!(result.is_ok());
    assert_eq!(exit_code(&result, &harness.restoration), 1);
}

// =============================================================================
// Pre-selection
// =============================================================================

#[test]
fn test_preset_interface_must_exist() {
    let harness = Harness::new(coffee_shop_host());
    let mut selector = ScriptedSelector::new(&["1"]);

    let err = harness
        .orchestrator()
        .with_interface(Some("wlan9".to_string()))
        .run(
            &mut selector,
            &FakePortal::new(PortalBehavior::Return),
            Arc::new(MemorySink::new()),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        TwinError::Selection(SelectionError::UnknownAdapter(ref name)) if name == "wlan9"
    ));
    assert_eq!(harness.restarts(), 1);
}

#[test]
fn test_preset_interface_and_ssid_skip_prompts_and_scan() {
    let harness = Harness::new(coffee_shop_host());
    let mut selector = ScriptedSelector::new(&[]);

    let report = harness
        .orchestrator()
        .with_interface(Some("wlan0".to_string()))
        .with_ssid(Some("Airport_Free".to_string()))
        .run(
            &mut selector,
            &FakePortal::new(PortalBehavior::Return),
            Arc::new(MemorySink::new()),
        )
        .unwrap();

    assert_eq!(report.ssid, "Airport_Free");
    assert!(selector.prompts.is_empty());
    assert!(harness.host.run_position("iwlist wlan0 scan").is_none());
    assert!(
        harness
            .host
            .written(HOSTAPD_CONF)
            .unwrap()
            .contains("ssid=Airport_Free\n")
    );
    assert_eq!(harness.restarts(), 1);
}
