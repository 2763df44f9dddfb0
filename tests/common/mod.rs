//! Shared test doubles for the integration tests
//!
//! `FakeHost` records every side effect in order and answers tool runs from a
//! table keyed by full command line. Unlisted commands succeed with empty
//! output.

#![allow(dead_code)]

use anyhow::{Result, anyhow};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use twinportal::error::{PortalError, TwinError};
use twinportal::host::{Host, ProcessInfo, Supervised, ToolOutput};
use twinportal::portal::{CredentialSink, PortalServer};
use twinportal::selection::{Selector, parse_selection};
use twinportal::shutdown::Shutdown;
use twinportal::tool_traits::ToolArgs;

pub const START_MANAGEMENT: &str = "systemctl start NetworkManager";
pub const STOP_MANAGEMENT: &str = "systemctl stop NetworkManager";
pub const HOSTAPD_CONF: &str = "/etc/hostapd/hostapd.conf";
pub const DNSMASQ_CONF: &str = "/etc/dnsmasq.conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Run(String),
    Spawn(String),
    Terminate(String),
    Kill(u32),
    Write(PathBuf, String),
    Pause(Duration),
}

struct EarlyExit {
    code: i32,
    stderr: String,
}

#[derive(Default)]
pub struct FakeHost {
    events: Arc<Mutex<Vec<Event>>>,
    responses: HashMap<String, ToolOutput>,
    run_errors: HashMap<String, String>,
    early_exits: HashMap<&'static str, EarlyExit>,
    processes: Vec<ProcessInfo>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// `iwconfig` reports these wireless adapters plus a loopback entry.
    pub fn with_adapters(self, names: &[&str]) -> Self {
        let mut out = String::new();
        for name in names {
            out.push_str(&format!(
                "{name}     IEEE 802.11  ESSID:off/any\n          Mode:Managed  Access Point: Not-Associated\n\n"
            ));
        }
        out.push_str("lo        no wireless extensions.\n\n");
        self.respond("iwconfig", ToolOutput::ok(out))
    }

    /// `iwlist <if> scan` sees these network names.
    pub fn with_scan(self, interface: &str, ssids: &[&str]) -> Self {
        let mut out = format!("{interface}     Scan completed :\n");
        for (i, ssid) in ssids.iter().enumerate() {
            out.push_str(&format!(
                "          Cell {:02} - Address: 00:11:22:33:44:{:02X}\n                    ESSID:\"{}\"\n",
                i + 1,
                i,
                ssid
            ));
        }
        self.respond(&format!("iwlist {interface} scan"), ToolOutput::ok(out))
    }

    pub fn respond(mut self, command_line: &str, output: ToolOutput) -> Self {
        self.responses.insert(command_line.to_string(), output);
        self
    }

    /// The command runs but exits non-zero.
    pub fn fail(self, command_line: &str, code: i32, stderr: &str) -> Self {
        self.respond(command_line, ToolOutput::failed(code, stderr))
    }

    /// The command cannot be started at all.
    pub fn unavailable(mut self, command_line: &str, reason: &str) -> Self {
        self.run_errors
            .insert(command_line.to_string(), reason.to_string());
        self
    }

    /// A spawned `program` is already gone when first polled.
    pub fn exit_on_spawn(mut self, program: &'static str, code: i32, stderr: &str) -> Self {
        self.early_exits.insert(
            program,
            EarlyExit {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn with_processes(mut self, processes: Vec<ProcessInfo>) -> Self {
        self.processes = processes;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Command lines of completed tool runs, in order.
    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Run(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn count_runs(&self, command_line: &str) -> usize {
        self.commands().iter().filter(|c| *c == command_line).count()
    }

    pub fn position(&self, wanted: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events().iter().position(wanted)
    }

    pub fn run_position(&self, command_line: &str) -> Option<usize> {
        self.position(|e| matches!(e, Event::Run(line) if line == command_line))
    }

    pub fn write_position(&self, path: &str) -> Option<usize> {
        self.position(|e| matches!(e, Event::Write(p, _) if p == Path::new(path)))
    }

    pub fn written(&self, path: &str) -> Option<String> {
        self.events().into_iter().find_map(|e| match e {
            Event::Write(p, contents) if p == Path::new(path) => Some(contents),
            _ => None,
        })
    }

    pub fn spawned(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Spawn(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Host for FakeHost {
    fn run(&self, tool: &dyn ToolArgs) -> Result<ToolOutput> {
        let line = tool.command_line();
        if let Some(reason) = self.run_errors.get(&line) {
            return Err(anyhow!("Failed to execute {}: {}", tool.program(), reason));
        }
        self.record(Event::Run(line.clone()));
        Ok(self
            .responses
            .get(&line)
            .cloned()
            .unwrap_or_else(|| ToolOutput::ok("")))
    }

    fn spawn(&self, tool: &dyn ToolArgs) -> Result<Box<dyn Supervised>> {
        let line = tool.command_line();
        if let Some(reason) = self.run_errors.get(&line) {
            return Err(anyhow!("Failed to spawn {}: {}", tool.program(), reason));
        }
        self.record(Event::Spawn(line));

        let pid = 1000 + self.spawned().len() as u32;
        let early = self.early_exits.get(tool.program());
        Ok(Box::new(FakeProcess {
            program: tool.program().to_string(),
            pid,
            exit_code: early.map(|e| e.code),
            stderr: early.map(|e| e.stderr.clone()).unwrap_or_default(),
            events: Arc::clone(&self.events),
        }))
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self.processes.clone())
    }

    fn kill(&self, pid: u32) -> Result<()> {
        self.record(Event::Kill(pid));
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.record(Event::Write(path.to_path_buf(), contents.to_string()));
        Ok(())
    }

    fn pause(&self, duration: Duration) {
        self.record(Event::Pause(duration));
    }
}

pub struct FakeProcess {
    program: String,
    pid: u32,
    exit_code: Option<i32>,
    stderr: String,
    events: Arc<Mutex<Vec<Event>>>,
}

impl Supervised for FakeProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.exit_code)
    }

    fn stderr_tail(&self) -> String {
        self.stderr.clone()
    }

    fn terminate(&mut self, _grace: Duration) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Terminate(self.program.clone()));
    }
}

/// Answers prompts from a queue; an empty queue behaves like closed input.
pub struct ScriptedSelector {
    answers: VecDeque<String>,
    pub prompts: Vec<(String, Vec<String>)>,
}

impl ScriptedSelector {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl Selector for ScriptedSelector {
    fn select(&mut self, prompt: &str, options: &[String]) -> Result<usize, TwinError> {
        self.prompts.push((prompt.to_string(), options.to_vec()));
        let answer = self.answers.pop_front().ok_or(TwinError::Interrupted)?;
        parse_selection(&answer, options.len()).map_err(TwinError::from)
    }
}

pub enum PortalBehavior {
    Return,
    Fail,
    Panic,
    /// Blocks until shutdown is requested, then drains like the real server
    AwaitShutdown,
}

/// How long an `AwaitShutdown` portal waits before giving up.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Stands in for the HTTP server.
pub struct FakePortal {
    behavior: PortalBehavior,
    pub served_on: Mutex<Option<SocketAddr>>,
}

impl FakePortal {
    pub fn new(behavior: PortalBehavior) -> Self {
        Self {
            behavior,
            served_on: Mutex::new(None),
        }
    }
}

impl PortalServer for FakePortal {
    fn serve(
        &self,
        addr: SocketAddr,
        _sink: Arc<dyn CredentialSink>,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), PortalError> {
        *self.served_on.lock().unwrap() = Some(addr);
        match self.behavior {
            PortalBehavior::Return => Ok(()),
            PortalBehavior::Fail => Err(PortalError::Serve(std::io::Error::other(
                "accept loop died",
            ))),
            PortalBehavior::Panic => panic!("portal crashed"),
            PortalBehavior::AwaitShutdown => {
                if shutdown.wait_timeout(SHUTDOWN_WAIT) {
                    Ok(())
                } else {
                    Err(PortalError::Serve(std::io::Error::other(
                        "shutdown never requested",
                    )))
                }
            }
        }
    }
}
