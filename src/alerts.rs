use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ResourceKind;

/// Severity an alert was raised (or escalated) at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Lifecycle state of an alert.
///
/// `Dismissed` and `Resolved` are terminal: no further transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Active,
    Acknowledged,
    Dismissed,
    Resolved,
}

impl AlertState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertState::Dismissed | AlertState::Resolved)
    }

    /// Whether the alert still tracks an ongoing condition.
    pub fn is_open(&self) -> bool {
        matches!(self, AlertState::Active | AlertState::Acknowledged)
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Active => write!(f, "active"),
            AlertState::Acknowledged => write!(f, "acknowledged"),
            AlertState::Dismissed => write!(f, "dismissed"),
            AlertState::Resolved => write!(f, "resolved"),
        }
    }
}

/// A threshold-crossing alert tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Monotonically increasing, never reused
    pub id: u64,

    pub resource: ResourceKind,

    /// Severity at creation, escalated in place on a warning-to-critical
    /// transition
    pub severity: Severity,

    pub message: String,

    pub created_at: DateTime<Utc>,

    pub state: AlertState,
}

/// Why an alert lifecycle command was refused.
///
/// `NotFound` and `InvalidState` are distinct on the wire so clients can tell
/// a bad id from a disallowed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertError {
    NotFound(u64),
    InvalidState { id: u64, state: AlertState },
}

impl std::fmt::Display for AlertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertError::NotFound(id) => write!(f, "alert {id} not found"),
            AlertError::InvalidState { id, state } => {
                write!(f, "invalid state: alert {id} is {state}")
            }
        }
    }
}

impl std::error::Error for AlertError {}

/// Filter for alert listings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AlertFilter {
    /// Only return alerts in this state, all states when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AlertState>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.state.is_none_or(|state| alert.state == state)
    }
}
