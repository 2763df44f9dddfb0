//! Host Side-Effect Seam
//!
//! Every interaction with the operating system flows through the [`Host`]
//! trait: running a tool to completion, spawning a supervised daemon, listing
//! processes, signalling a process, writing a configuration file, pausing.
//!
//! [`SystemHost`] is the real implementation. It runs every tool in its own
//! process group (see [`CommandProcessGroup`]) so nothing it starts can outlive
//! the orchestrator. Tests substitute a recording double.

use crate::process_guard::{self, CommandProcessGroup};
use crate::tool_traits::ToolArgs;
use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// How many trailing stderr lines a supervised daemon keeps for diagnostics
const STDERR_TAIL_LINES: usize = 20;

/// Grace period between SIGTERM and SIGKILL when stopping a daemon
pub const DAEMON_STOP_GRACE: Duration = Duration::from_secs(3);

/// Output from a tool run to completion.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Standard output from the tool.
    pub stdout: String,
    /// Standard error from the tool.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    /// Whether the tool exited successfully (exit code 0).
    pub success: bool,
}

impl ToolOutput {
    /// Successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    /// Failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Check if the tool succeeded and return a one-line reason if not.
    pub fn ensure_success(&self, context: &str) -> std::result::Result<(), String> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.unwrap_or(-1);
            let stderr = self.stderr.trim();
            if stderr.is_empty() {
                Err(format!("{} failed (exit code {})", context, code))
            } else {
                Err(format!("{} failed (exit code {}): {}", context, code, stderr))
            }
        }
    }
}

/// A running process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// argv, with argv[0] first
    pub cmdline: Vec<String>,
}

/// A background child the orchestrator started and may later stop.
pub trait Supervised: Send {
    /// OS process id.
    fn id(&self) -> u32;

    /// Exit code if the process has already exited (-1 for signal death).
    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>>;

    /// Most recent stderr lines, oldest first.
    fn stderr_tail(&self) -> String;

    /// Stop the process (and its group), waiting at most `grace`.
    fn terminate(&mut self, grace: Duration);
}

/// Side-effect boundary between the orchestrator and the operating system.
pub trait Host: Send + Sync {
    /// Run a tool to completion with captured output.
    fn run(&self, tool: &dyn ToolArgs) -> Result<ToolOutput>;

    /// Start a tool in the background with captured output.
    fn spawn(&self, tool: &dyn ToolArgs) -> Result<Box<dyn Supervised>>;

    /// Snapshot of running processes.
    fn processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Kill a process with the non-catchable SIGKILL.
    fn kill(&self, pid: u32) -> Result<()>;

    /// Replace the file at `path` with `contents`.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Block for `duration`.
    fn pause(&self, duration: Duration);
}

/// Production host backed by `std::process` and `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn run(&self, tool: &dyn ToolArgs) -> Result<ToolOutput> {
        let command_line = tool.command_line();
        if tool.mutates_host() {
            info!("run: {}", command_line);
        } else {
            debug!("run: {}", command_line);
        }

        let output = Command::new(tool.program())
            .args(tool.to_cli_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group()
            .output()
            .with_context(|| format!("Failed to run: {}", command_line))?;

        let exit_code = output.status.code();
        let success = output.status.success();
        if !success {
            debug!("{} exited with {:?}", tool.program(), exit_code);
        }

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code,
            success,
        })
    }

    fn spawn(&self, tool: &dyn ToolArgs) -> Result<Box<dyn Supervised>> {
        let command_line = tool.command_line();
        info!("spawn: {}", command_line);

        let child = Command::new(tool.program())
            .args(tool.to_cli_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group()
            .spawn()
            .with_context(|| format!("Failed to spawn: {}", command_line))?;

        Ok(Box::new(SupervisedChild::new(tool.program(), child)))
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let mut processes = Vec::new();
        let entries = std::fs::read_dir("/proc").context("Failed to read /proc")?;

        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes can exit between readdir and read; skip them
            let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let cmdline = parse_cmdline(&raw);
            if !cmdline.is_empty() {
                processes.push(ProcessInfo { pid, cmdline });
            }
        }

        Ok(processes)
    }

    fn kill(&self, pid: u32) -> Result<()> {
        process_guard::send_signal(pid, Signal::SIGKILL)
            .with_context(|| format!("Failed to send SIGKILL to PID {}", pid))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }
        std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Split a NUL-separated `/proc/<pid>/cmdline` into arguments.
pub fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).to_string())
        .collect()
}

/// A spawned child whose stdout/stderr are drained on background threads.
///
/// Draining keeps the daemon from blocking on a full pipe; stdout lines go to
/// debug logs, stderr lines to debug logs and a bounded tail buffer.
pub struct SupervisedChild {
    child: Option<Child>,
    pid: u32,
    tail: Arc<Mutex<VecDeque<String>>>,
    drains: Vec<JoinHandle<()>>,
}

impl SupervisedChild {
    fn new(name: &'static str, mut child: Child) -> Self {
        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let mut drains = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            drains.push(drain(name, stdout, None));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(drain(name, stderr, Some(Arc::clone(&tail))));
        }

        Self {
            pid: child.id(),
            child: Some(child),
            tail,
            drains,
        }
    }

    fn join_drains(&mut self) {
        for handle in self.drains.drain(..) {
            let _ = handle.join();
        }
    }
}

fn drain<R: Read + Send + 'static>(
    name: &'static str,
    stream: R,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            debug!(daemon = name, "{}", line);
            if let Some(tail) = &tail {
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }
    })
}

impl Supervised for SupervisedChild {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        match child.try_wait()? {
            Some(status) => {
                // Pipes hit EOF once the process is gone; collect the tail
                self.join_drains();
                Ok(Some(status.code().unwrap_or(-1)))
            }
            None => Ok(None),
        }
    }

    fn stderr_tail(&self) -> String {
        self.tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }

    fn terminate(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(None) = child.try_wait() {
            process_guard::terminate_group(self.pid, grace);
        }
        let _ = child.wait();
        self.join_drains();
    }
}
