//! AlertActor - owns the alert lifecycle
//!
//! The single owner of all alert state. Status transitions from the monitor
//! and lifecycle commands from clients serialize through one mailbox, so a
//! command racing a transition composes into one well-defined final state
//! instead of a lost update.
//!
//! ## Transition Policy
//!
//! Keyed on the *current* status of a resource and whether an open (active or
//! acknowledged) alert exists for it:
//!
//! ```text
//! current == ok        → resolve the open alert, if any
//! current == warning   → open a warning alert if none is open
//! current == critical  → open a critical alert if none is open,
//!                        escalate an open warning alert in place (same id)
//! current == unknown   → no effect (a failed read is neither an outage
//!                        nor a recovery)
//! ```
//!
//! Escalation reuses the alert id; a warning that worsens to critical is one
//! incident, not two. A critical that improves to warning keeps its recorded
//! severity, only a return to ok resolves it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use crate::alerts::{Alert, AlertError, AlertFilter, AlertState, Severity};
use crate::{ResourceKind, ResourceStatus};

use super::messages::{AlertCommand, TransitionEvent};

/// Actor that maintains alert state
pub struct AlertActor {
    /// All alerts ever raised, keyed by id; BTreeMap iteration order is
    /// creation order since ids are monotonic
    alerts: BTreeMap<u64, Alert>,

    next_id: u64,

    /// Id of the open (active or acknowledged) alert per resource
    open: HashMap<ResourceKind, u64>,

    command_rx: mpsc::Receiver<AlertCommand>,

    event_rx: broadcast::Receiver<TransitionEvent>,
}

impl AlertActor {
    fn new(
        command_rx: mpsc::Receiver<AlertCommand>,
        event_rx: broadcast::Receiver<TransitionEvent>,
    ) -> Self {
        Self {
            alerts: BTreeMap::new(),
            next_id: 1,
            open: HashMap::new(),
            command_rx,
            event_rx,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!("starting alert actor");

        // Once the monitor drops its sender the transition arm goes quiet,
        // but client commands keep being served.
        let mut events_open = true;

        loop {
            tokio::select! {
                result = self.event_rx.recv(), if events_open => {
                    match result {
                        Ok(event) => self.handle_transition(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("alert actor lagged, skipped {skipped} transitions");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            trace!("transition channel closed");
                            events_open = false;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(AlertCommand::Acknowledge { id, respond_to }) => {
                            let _ = respond_to.send(self.acknowledge(id));
                        }

                        Some(AlertCommand::Dismiss { id, respond_to }) => {
                            let _ = respond_to.send(self.dismiss(id));
                        }

                        Some(AlertCommand::List { filter, respond_to }) => {
                            let _ = respond_to.send(self.list(filter));
                        }

                        Some(AlertCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("alert actor stopped");
    }

    /// Apply one status transition from the monitor.
    #[instrument(skip(self, event), fields(resource = %event.resource))]
    fn handle_transition(&mut self, event: TransitionEvent) {
        trace!(
            "transition: {} -> {} ({:?})",
            event.previous, event.current, event.value
        );

        match event.current {
            ResourceStatus::Ok => self.resolve(event.resource),
            ResourceStatus::Warning => self.raise(&event, Severity::Warning),
            ResourceStatus::Critical => self.raise(&event, Severity::Critical),
            ResourceStatus::Unknown => {}
        }
    }

    /// Resolve the open alert for a resource, if one exists.
    fn resolve(&mut self, resource: ResourceKind) {
        let Some(id) = self.open.remove(&resource) else {
            return;
        };

        let Some(alert) = self.alerts.get_mut(&id) else {
            error!("open alert index points at missing alert {id}");
            return;
        };

        alert.state = AlertState::Resolved;
        debug!("alert {id} resolved: {resource} back to ok");
    }

    /// Raise or escalate the alert for a resource.
    fn raise(&mut self, event: &TransitionEvent, severity: Severity) {
        let resource = event.resource;

        if let Some(&id) = self.open.get(&resource) {
            let Some(alert) = self.alerts.get_mut(&id) else {
                error!("open alert index points at missing alert {id}");
                return;
            };

            // Escalate in place, never re-create while an alert is open.
            // A critical alert that improves to warning keeps its severity.
            if alert.severity == Severity::Warning && severity == Severity::Critical {
                alert.severity = Severity::Critical;
                alert.message = alert_message(event, severity);
                debug!("alert {id} escalated to critical");
            }
            return;
        }

        let id = self.next_id;
        self.next_id += 1;

        let alert = Alert {
            id,
            resource,
            severity,
            message: alert_message(event, severity),
            created_at: event.timestamp,
            state: AlertState::Active,
        };

        debug!("alert {id} created: {}", alert.message);
        self.alerts.insert(id, alert);
        self.open.insert(resource, id);
    }

    fn acknowledge(&mut self, id: u64) -> Result<Alert, AlertError> {
        let Some(alert) = self.alerts.get_mut(&id) else {
            return Err(AlertError::NotFound(id));
        };

        match alert.state {
            AlertState::Active => {
                alert.state = AlertState::Acknowledged;
                debug!("alert {id} acknowledged");
                Ok(alert.clone())
            }
            state => Err(AlertError::InvalidState { id, state }),
        }
    }

    fn dismiss(&mut self, id: u64) -> Result<Alert, AlertError> {
        let Some(alert) = self.alerts.get_mut(&id) else {
            return Err(AlertError::NotFound(id));
        };

        match alert.state {
            AlertState::Active | AlertState::Acknowledged => {
                alert.state = AlertState::Dismissed;
                self.open.remove(&alert.resource);
                debug!("alert {id} dismissed");
                Ok(alert.clone())
            }
            state => Err(AlertError::InvalidState { id, state }),
        }
    }

    fn list(&self, filter: AlertFilter) -> Vec<Alert> {
        self.alerts
            .values()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect()
    }
}

fn alert_message(event: &TransitionEvent, severity: Severity) -> String {
    match event.value {
        Some(value) => format!(
            "{} usage at {value:.1}% crossed the {severity} threshold",
            event.resource
        ),
        None => format!("{} crossed the {severity} threshold", event.resource),
    }
}

/// Handle for controlling the AlertActor
///
/// Command methods return `None` when the actor has shut down; callers map
/// that onto their own "unavailable" error.
#[derive(Clone)]
pub struct AlertHandle {
    sender: mpsc::Sender<AlertCommand>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AlertHandle {
    /// Spawn a new alert actor subscribed to `event_rx`.
    pub fn spawn(event_rx: broadcast::Receiver<TransitionEvent>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = AlertActor::new(cmd_rx, event_rx);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    pub async fn acknowledge(&self, id: u64) -> Option<Result<Alert, AlertError>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Acknowledge { id, respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn dismiss(&self, id: u64) -> Option<Result<Alert, AlertError>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::Dismiss { id, respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// List alerts in creation order, oldest first.
    pub async fn list(&self, filter: AlertFilter) -> Option<Vec<Alert>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AlertCommand::List {
                filter,
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Stop the alert actor and wait until it has fully terminated.
    ///
    /// Idempotent; concurrent and repeated calls are safe.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(AlertCommand::Shutdown).await;

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("alert actor task failed: {e}");
            }
        }
    }
}
