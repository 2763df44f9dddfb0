//! Run State Machine
//!
//! Authoritative record of how far a run got. Stages only move forward one
//! step at a time; any failure (or the end of the run) jumps straight to
//! `Terminated`, remembering the stage it left from.
//!
//! # Stage Flow
//!
//! ```text
//! Idle
//!     ↓
//! AdapterSelected
//!     ↓
//! NetworkSelected
//!     ↓
//! Quiesced
//!     ↓
//! ApRunning
//!     ↓
//! ServiceRunning
//!     ↓
//! PortalServing
//!     ↓
//! Terminated
//!
//! (Any stage can jump to Terminated)
//! ```

use std::fmt;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RunStage {
    Idle = 0,
    AdapterSelected = 1,
    NetworkSelected = 2,
    /// Management suspended, supplicants gone, link cycled
    Quiesced = 3,
    ApRunning = 4,
    ServiceRunning = 5,
    PortalServing = 6,
    Terminated = 7,
}

impl RunStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// The next stage in the sequence, or None once terminated
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::AdapterSelected),
            Self::AdapterSelected => Some(Self::NetworkSelected),
            Self::NetworkSelected => Some(Self::Quiesced),
            Self::Quiesced => Some(Self::ApRunning),
            Self::ApRunning => Some(Self::ServiceRunning),
            Self::ServiceRunning => Some(Self::PortalServing),
            Self::PortalServing => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AdapterSelected => "Adapter selected",
            Self::NetworkSelected => "Network selected",
            Self::Quiesced => "Adapter quiesced",
            Self::ApRunning => "Access point running",
            Self::ServiceRunning => "DHCP/DNS running",
            Self::PortalServing => "Portal serving",
            Self::Terminated => "Terminated",
        }
    }

    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::Idle,
            Self::AdapterSelected,
            Self::NetworkSelected,
            Self::Quiesced,
            Self::ApRunning,
            Self::ServiceRunning,
            Self::PortalServing,
            Self::Terminated,
        ]
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: RunStage, to: RunStage },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: RunStage, to: RunStage },

    #[error("Run already terminated")]
    AlreadyTerminated,

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: RunStage },
}

impl From<RunTransitionError> for crate::error::TwinError {
    fn from(err: RunTransitionError) -> Self {
        crate::error::TwinError::RunTransition(err.to_string())
    }
}

/// Owns the current stage of one run.
///
/// ```
/// use twinportal::run_state::{RunContext, RunStage};
///
/// let mut ctx = RunContext::new();
/// ctx.transition_to(RunStage::AdapterSelected).unwrap();
/// assert!(ctx.transition_to(RunStage::ApRunning).is_err());
///
/// ctx.terminate();
/// assert_eq!(ctx.current_stage(), RunStage::Terminated);
/// assert_eq!(ctx.terminated_from(), Some(RunStage::AdapterSelected));
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    current: RunStage,
    /// Stage the run was in when it jumped to Terminated
    terminated_from: Option<RunStage>,
    started: Instant,
    history: Vec<(RunStage, std::time::Duration)>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            current: RunStage::Idle,
            terminated_from: None,
            started: Instant::now(),
            history: Vec::with_capacity(RunStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> RunStage {
        self.current
    }

    #[inline]
    pub fn terminated_from(&self) -> Option<RunStage> {
        self.terminated_from
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.current.is_terminal()
    }

    /// Stages entered so far with the time since the run started
    pub fn history(&self) -> &[(RunStage, std::time::Duration)] {
        &self.history
    }

    /// Move to `target`, which must be the immediate next stage.
    ///
    /// `Terminated` is only reachable through [`terminate`](Self::terminate).
    pub fn transition_to(&mut self, target: RunStage) -> Result<RunStage, RunTransitionError> {
        if self.current.is_terminal() {
            return Err(RunTransitionError::AlreadyTerminated);
        }
        if target == self.current {
            return Err(RunTransitionError::AlreadyAtStage { stage: target });
        }
        if target < self.current {
            return Err(RunTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if target.is_terminal() || self.current.next() != Some(target) {
            return Err(RunTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record(target);
        self.current = target;
        tracing::debug!("Run stage: {}", target);
        Ok(target)
    }

    /// Jump to `Terminated` from wherever the run is. Idempotent.
    pub fn terminate(&mut self) {
        if self.current.is_terminal() {
            return;
        }
        self.terminated_from = Some(self.current);
        self.record(RunStage::Terminated);
        self.current = RunStage::Terminated;
    }

    fn record(&mut self, stage: RunStage) {
        self.history.push((stage, self.started.elapsed()));
    }
}
