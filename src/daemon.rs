//! Configurable daemon launch
//!
//! hostapd and dnsmasq follow the same procedure: overwrite a well-known
//! configuration file, run any pre-launch step, spawn the daemon with captured
//! output, and make sure it survives a short startup window. The
//! [`ConfigurableDaemon`] trait captures that procedure once; each daemon only
//! supplies its rendering, its command, and its pre-launch step.

use crate::error::LaunchError;
use crate::host::{DAEMON_STOP_GRACE, Host, Supervised};
use crate::tool_traits::ToolArgs;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// A running daemon. Dropping the handle stops it.
pub struct DaemonHandle {
    name: &'static str,
    process: Box<dyn Supervised>,
}

impl DaemonHandle {
    pub fn new(name: &'static str, process: Box<dyn Supervised>) -> Self {
        Self { name, process }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pid(&self) -> u32 {
        self.process.id()
    }
}

impl fmt::Debug for DaemonHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonHandle")
            .field("name", &self.name)
            .field("pid", &self.process.id())
            .finish()
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        info!("Stopping {} (PID {})", self.name, self.process.id());
        self.process.terminate(DAEMON_STOP_GRACE);
    }
}

/// A daemon driven by a rendered configuration file.
pub trait ConfigurableDaemon {
    /// Daemon name for logs and errors.
    fn name(&self) -> &'static str;

    /// Well-known configuration path, overwritten on every launch.
    fn config_path(&self) -> &Path;

    /// Configuration file contents. Must be deterministic.
    fn render(&self) -> String;

    /// Command that starts the daemon in the foreground.
    fn command(&self) -> Box<dyn ToolArgs>;

    /// Validate before anything touches the host.
    fn validate(&self) -> Result<(), LaunchError> {
        Ok(())
    }

    /// Step run after rendering and before spawning.
    fn prepare(&self, _host: &dyn Host) -> Result<(), LaunchError> {
        Ok(())
    }

    /// Write the rendered configuration, replacing any prior content.
    fn render_to(&self, host: &dyn Host) -> Result<(), LaunchError> {
        let path = self.config_path();
        host.write_file(path, &self.render())
            .map_err(|e| LaunchError::Render {
                daemon: self.name(),
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;
        info!("Wrote {} configuration to {:?}", self.name(), path);
        Ok(())
    }

    /// Spawn the daemon and check it is still up after `startup`.
    ///
    /// A non-zero exit inside the window is a launch failure carrying the
    /// daemon's last stderr lines.
    fn start(&self, host: &dyn Host, startup: Duration) -> Result<DaemonHandle, LaunchError> {
        let name = self.name();
        let process = host.spawn(self.command().as_ref()).map_err(|e| LaunchError::Spawn {
            daemon: name,
            reason: format!("{:#}", e),
        })?;
        let mut handle = DaemonHandle::new(name, process);

        host.pause(startup);
        match handle.process.try_exit_code() {
            Ok(Some(0)) => warn!("{} exited immediately with status 0", name),
            Ok(Some(code)) => {
                return Err(LaunchError::Exited {
                    daemon: name,
                    code,
                    stderr: handle.process.stderr_tail(),
                });
            }
            Ok(None) => info!("{} running (PID {})", name, handle.pid()),
            Err(e) => warn!("Could not poll {}: {}", name, e),
        }

        Ok(handle)
    }

    /// Stop a daemon started by this launcher.
    fn stop(&self, handle: DaemonHandle) {
        drop(handle);
    }
}

/// Validate, render, prepare, then start `daemon`.
pub fn launch(
    host: &dyn Host,
    daemon: &dyn ConfigurableDaemon,
    startup: Duration,
) -> Result<DaemonHandle, LaunchError> {
    daemon.validate()?;
    daemon.render_to(host)?;
    daemon.prepare(host)?;
    daemon.start(host, startup)
}

/// Run a helper to completion, mapping any failure to `LaunchError::Helper`.
pub(crate) fn run_helper(
    host: &dyn Host,
    daemon: &'static str,
    tool: &dyn ToolArgs,
) -> Result<(), LaunchError> {
    let output = host.run(tool).map_err(|e| LaunchError::Helper {
        daemon,
        reason: format!("{:#}", e),
    })?;
    output
        .ensure_success(&tool.command_line())
        .map_err(|reason| LaunchError::Helper { daemon, reason })
}
