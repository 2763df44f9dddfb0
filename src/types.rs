//! Type-safe enums shared across the orchestrator
//!
//! Stringly-typed knobs (scan strategy, radio mode, service actions) are
//! modelled as enums so the config file and CLI parse into exhaustive matches.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How nearby networks are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStrategy {
    /// `iwlist <if> scan`, parsed for `ESSID:` markers
    #[default]
    Iwlist,
    /// `nmcli -f SSID device wifi list`, tabular with a header row
    Nmcli,
}

impl ScanStrategy {
    /// Binary that must be present on the host for this strategy
    pub const fn binary(self) -> &'static str {
        match self {
            Self::Iwlist => "iwlist",
            Self::Nmcli => "nmcli",
        }
    }
}

/// hostapd `hw_mode` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HwMode {
    /// 802.11a, 5 GHz
    A,
    /// 802.11b, 2.4 GHz
    B,
    /// 802.11g, 2.4 GHz
    #[default]
    G,
}

/// systemd unit action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
}

/// Administrative link state for `ip link set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
}

/// Individually fallible steps of interface quiescing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum QuiesceStep {
    StopManagement,
    EnumerateProcesses,
    TerminateSupplicant,
    LinkDown,
    LinkUp,
}
