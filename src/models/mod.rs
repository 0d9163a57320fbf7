//! Data model for the managed VPS resource.
//!
//! Snapshots are never cached beyond a single read — every decision is made
//! against a fresh fetch from the provider.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

/// Lifecycle power status reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerStatus {
    /// Server is up.
    Active,
    /// Server is powered off (no hourly billing).
    ShutOff,
    /// Any transitional or unexpected status (BUILD, REBOOT, ERROR, ...).
    Other(String),
}

impl PowerStatus {
    /// Parse the provider's `status` field.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "ACTIVE" => PowerStatus::Active,
            "SHUTOFF" => PowerStatus::ShutOff,
            other => PowerStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerStatus::Active => write!(f, "ACTIVE"),
            PowerStatus::ShutOff => write!(f, "SHUTOFF"),
            PowerStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One network endpoint attached to the server (display only).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
    pub version: u8,
}

/// Snapshot of the managed server from a single status read.
#[derive(Debug, Clone)]
pub struct ServerDetail {
    pub name: String,
    pub status: PowerStatus,
    /// Present iff a provider-side operation is executing on the server.
    pub task_state: Option<String>,
    /// Hypervisor power-state code (see [`power_state_label`]).
    pub power_state: i64,
    pub created: String,
    /// Network name → attached endpoints.
    pub addresses: HashMap<String, Vec<ServerAddress>>,
}

impl ServerDetail {
    /// Whether the server has no asynchronous operation in progress.
    pub fn is_quiescent(&self) -> bool {
        self.task_state.is_none()
    }
}

/// Human-readable label for a hypervisor power-state code.
pub fn power_state_label(code: i64) -> &'static str {
    match code {
        0 => "NOSTATE",
        1 => "RUNNING",
        3 => "PAUSED",
        4 => "SHUTDOWN",
        6 => "CRASHED",
        7 => "SUSPENDED",
        _ => "UNKNOWN",
    }
}

/// A requested power transition. Reboot is always soft — a hard reset could
/// corrupt the game world the VPS hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Start,
    Stop,
    Reboot,
}

impl ActionKind {
    /// All action kinds, for iterating cooldown configuration.
    pub const ALL: [ActionKind; 3] = [ActionKind::Start, ActionKind::Stop, ActionKind::Reboot];

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Reboot => "reboot",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized result of submitting an action to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Command acknowledged; a transition is expected.
    Accepted,
    /// Provider reports the server is already in (or entering) the requested
    /// state. Treated as success, not failure.
    AlreadyInTargetState,
    /// Provider refused the command. Raw status kept for diagnostics.
    Rejected { status: u16, detail: String },
    /// Network or timeout failure; safe to retry later.
    TransientFailure(String),
    /// Token rejected. The caller refreshes and retries exactly once.
    Unauthorized,
}

impl ActionOutcome {
    /// Whether the outcome counts as success (including the no-op case).
    #[allow(dead_code)]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Accepted | ActionOutcome::AlreadyInTargetState
        )
    }
}
