//! Error handling module for twinportal
//!
//! Every component returns its own locally scoped error type. The orchestrator
//! folds them into [`TwinError`], which is the only type that knows how a
//! failure maps to a process exit code.

use crate::types::QuiesceStep;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Adapter or network discovery came back empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No wireless adapters found")]
    NoAdaptersFound,

    #[error("Scan on {adapter} failed: {reason}")]
    ScanFailed { adapter: String, reason: String },

    #[error("No networks found on {adapter}")]
    NoNetworksFound { adapter: String },
}

/// The operator's choice could not be mapped onto the offered options.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("'{input}' is not a number")]
    NotANumber { input: String },

    #[error("Choice {choice} is out of range (expected 1-{len})")]
    OutOfRange { choice: usize, len: usize },

    #[error("Adapter '{0}' is not a wireless adapter on this host")]
    UnknownAdapter(String),

    #[error("Nothing to choose from")]
    NoOptions,
}

/// A privileged quiesce step failed; the whole step is aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Quiesce step '{step}' failed: {reason}")]
pub struct QuiesceError {
    pub step: QuiesceStep,
    pub reason: String,
}

impl QuiesceError {
    pub fn new(step: QuiesceStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Rendering or starting one of the daemons failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Invalid {daemon} configuration: {reason}")]
    InvalidConfig { daemon: &'static str, reason: String },

    #[error("Failed to write {daemon} configuration to {path:?}: {reason}")]
    Render {
        daemon: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Pre-launch step for {daemon} failed: {reason}")]
    Helper { daemon: &'static str, reason: String },

    #[error("Failed to spawn {daemon}: {reason}")]
    Spawn { daemon: &'static str, reason: String },

    #[error("{daemon} exited with code {code}: {stderr}")]
    Exited {
        daemon: &'static str,
        code: i32,
        stderr: String,
    },
}

/// The captive portal could not serve.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Failed to build portal runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to bind portal on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Portal stopped with an error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Main error type for twinportal
#[derive(Error, Debug)]
pub enum TwinError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Quiesce(#[from] QuiesceError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Portal(#[from] PortalError),

    /// Run state machine rejected a transition (programming error)
    #[error("Run transition error: {0}")]
    RunTransition(String),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (terminal, files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operator cancelled (closed input or interrupt); not a failure
    #[error("Interrupted by operator")]
    Interrupted,
}

/// Result type alias for twinportal operations
pub type Result<T> = std::result::Result<T, TwinError>;

impl TwinError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for the user-initiated cancellation path
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_interrupted() { 0 } else { 1 }
    }
}
