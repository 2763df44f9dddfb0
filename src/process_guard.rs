//! Process lifecycle management for daemons and signal-driven shutdown
//!
//! The access-point and address-service daemons are spawned in their own
//! process group with a parent-death signal, so they never outlive the
//! orchestrator. Stopping a daemon signals the whole group: SIGTERM first,
//! SIGKILL once the grace period runs out.
//!
//! Interrupts (SIGINT, SIGTERM, SIGHUP) are handled on a dedicated thread that
//! requests a cooperative [`Shutdown`]. Only if the run scope fails to release
//! the management lease in time does the thread run the once-only
//! [`Restoration`] itself and exit.

use crate::management::Restoration;
use crate::shutdown::Shutdown;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Send a signal to a process
pub fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Send a signal to an entire process group
/// Negative PID addresses the group whose PGID equals `pgid`
pub fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Check if a process is still alive (not dead or zombie)
pub fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/pid/stat is the state; Z and X are not running
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // comm (field 2) may contain spaces, so split after the closing paren
        if let Some(rest) = stat.rsplit_once(')').map(|(_, rest)| rest) {
            if let Some(state) = rest.split_whitespace().next() {
                return !matches!(state, "Z" | "X");
            }
        }
    }

    true
}

/// Terminate a process group leader and its children.
///
/// Sends SIGTERM to the group, polls for up to `grace_period`, then SIGKILLs
/// whatever is left. Falls back to signalling the single PID when the group
/// signal fails (e.g. the child never became a group leader).
pub fn terminate_group(pid: u32, grace_period: Duration) {
    if let Err(e) = send_signal_to_group(pid, Signal::SIGTERM) {
        debug!("Group SIGTERM to {} failed ({}), signalling PID directly", pid, e);
        if let Err(e2) = send_signal(pid, Signal::SIGTERM) {
            debug!("SIGTERM to PID {} failed: {}", pid, e2);
            return;
        }
    }

    let start = Instant::now();
    while start.elapsed() < grace_period {
        if !is_process_alive(pid) {
            debug!("Process group {} exited after SIGTERM", pid);
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    warn!("Process group {} did not terminate, sending SIGKILL", pid);
    if send_signal_to_group(pid, Signal::SIGKILL).is_err() {
        let _ = send_signal(pid, Signal::SIGKILL);
    }
}

/// How long the run scope gets to unwind after an interrupt before the
/// handler restores networking itself and exits.
pub const INTERRUPT_FALLBACK: Duration = Duration::from_secs(10);

/// Install handlers for SIGINT (Ctrl+C), SIGTERM and SIGHUP.
///
/// The first signal requests shutdown; the run scope then stops its daemons
/// and releases the management lease. If the restoration still has not run
/// after `fallback`, the handler runs it directly and exits 0 when host
/// networking came back, 1 otherwise.
pub fn install_interrupt_handler(
    shutdown: Arc<Shutdown>,
    restoration: Arc<Restoration>,
    fallback: Duration,
) -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            info!("Received {}, shutting down", signal_name);
            println!();
            println!("[*] Interrupted, stopping the access point...");
            shutdown.request();

            let start = Instant::now();
            while start.elapsed() < fallback {
                if restoration.has_run() {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }

            warn!(
                "Run did not wind down within {:?}, restoring networking directly",
                fallback
            );
            let code = if restoration.restore() { 0 } else { 1 };
            std::process::exit(code);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Run the command in its own process group and tie its lifetime to ours
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                // Child gets SIGTERM if the orchestrator dies without cleanup
                nix::sys::prctl::set_pdeathsig(Signal::SIGTERM)
                    .map_err(std::io::Error::other)?;

                Ok(())
            });
        }
        self
    }
}
