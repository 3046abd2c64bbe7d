//! Request dispatch
//!
//! Pure routing from [`RequestKind`] to handler. The dispatcher touches
//! shared state only through the store and the actor handles; handlers whose
//! dependency was never wired in answer with an "unavailable" failure instead
//! of crashing.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::actors::alert::AlertHandle;
use crate::actors::monitor::MonitorHandle;
use crate::alerts::AlertFilter;
use crate::config::ConfigStore;

use super::protocol::{Request, RequestKind, Response};

/// Static routing table from request kind to handler.
pub struct Dispatcher {
    config: Arc<ConfigStore>,
    monitor: Option<MonitorHandle>,
    alerts: Option<AlertHandle>,
    shutdown_tx: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<ConfigStore>,
        monitor: Option<MonitorHandle>,
        alerts: Option<AlertHandle>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            monitor,
            alerts,
            shutdown_tx,
        }
    }

    /// Route one request to its handler and produce the response.
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn dispatch(&self, request: Request) -> Response {
        match request.kind {
            RequestKind::Ping => Response::success(json!({"pong": true})),

            RequestKind::Version => {
                Response::success(json!({"version": env!("CARGO_PKG_VERSION")}))
            }

            RequestKind::ConfigGet => encode(self.config.get().as_ref()),

            RequestKind::ConfigReload => {
                if self.config.reload() {
                    encode(self.config.get().as_ref())
                } else {
                    Response::failure(
                        "configuration reload failed, previous configuration retained",
                    )
                }
            }

            RequestKind::HealthGet => match &self.monitor {
                Some(monitor) => encode(&monitor.health()),
                None => Response::failure("system monitor unavailable"),
            },

            RequestKind::AlertsGet => {
                let filter = match request.payload {
                    Some(payload) => match serde_json::from_value::<AlertFilter>(payload) {
                        Ok(filter) => filter,
                        Err(e) => return Response::failure(format!("invalid alert filter: {e}")),
                    },
                    None => AlertFilter::default(),
                };

                match &self.alerts {
                    Some(alerts) => match alerts.list(filter).await {
                        Some(list) => Response::success(json!({"alerts": list})),
                        None => Response::failure("alert manager unavailable"),
                    },
                    None => Response::failure("alert manager unavailable"),
                }
            }

            RequestKind::AlertsAcknowledge => {
                let Some(id) = alert_id(&request.payload) else {
                    return Response::failure("request payload must carry an alert id");
                };

                match &self.alerts {
                    Some(alerts) => match alerts.acknowledge(id).await {
                        Some(Ok(alert)) => encode(&alert),
                        Some(Err(e)) => Response::failure(e.to_string()),
                        None => Response::failure("alert manager unavailable"),
                    },
                    None => Response::failure("alert manager unavailable"),
                }
            }

            RequestKind::AlertsDismiss => {
                let Some(id) = alert_id(&request.payload) else {
                    return Response::failure("request payload must carry an alert id");
                };

                match &self.alerts {
                    Some(alerts) => match alerts.dismiss(id).await {
                        Some(Ok(alert)) => encode(&alert),
                        Some(Err(e)) => Response::failure(e.to_string()),
                        None => Response::failure("alert manager unavailable"),
                    },
                    None => Response::failure("alert manager unavailable"),
                }
            }

            RequestKind::Shutdown => {
                debug!("shutdown requested over IPC");
                let _ = self.shutdown_tx.send(true);
                Response::success(json!({"message": "shutting down"}))
            }
        }
    }
}

fn alert_id(payload: &Option<Value>) -> Option<u64> {
    payload.as_ref()?.get("id")?.as_u64()
}

fn encode<T: Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(payload) => Response::success(payload),
        Err(e) => Response::failure(format!("failed to encode response payload: {e}")),
    }
}
