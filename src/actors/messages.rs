//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: request/response messages sent to a specific actor via mpsc
//! 2. **Events**: broadcast notifications published to all subscribers
//! 3. **Immutability**: all messages are cloneable for multi-subscriber patterns

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::alerts::{Alert, AlertError, AlertFilter};
use crate::{ResourceKind, ResourceStatus};

/// Event published when a resource's classified status changes between two
/// consecutive ticks.
///
/// Steady-state ticks publish nothing; subscribers only see edges.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub resource: ResourceKind,

    /// Status at the previous tick
    pub previous: ResourceStatus,

    /// Status at this tick
    pub current: ResourceStatus,

    /// Utilization percentage that produced `current`, `None` when the read
    /// failed (`current` is then `Unknown`)
    pub value: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to the MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run a sampling tick immediately, bypassing the interval timer.
    ///
    /// Used for testing and manual refresh operations.
    SampleNow {
        respond_to: oneshot::Sender<()>,
    },

    /// The configuration snapshot changed; re-read interval and thresholds.
    ConfigChanged,

    /// Gracefully shut down the sampling loop
    Shutdown,
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Acknowledge an active alert
    Acknowledge {
        id: u64,
        respond_to: oneshot::Sender<Result<Alert, AlertError>>,
    },

    /// Dismiss an active or acknowledged alert
    Dismiss {
        id: u64,
        respond_to: oneshot::Sender<Result<Alert, AlertError>>,
    },

    /// List alerts, oldest first
    List {
        filter: AlertFilter,
        respond_to: oneshot::Sender<Vec<Alert>>,
    },

    /// Gracefully shut down the alert actor
    Shutdown,
}
