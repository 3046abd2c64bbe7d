//! Wire message shapes
//!
//! The request kinds form a closed set: an unknown kind fails decoding and is
//! answered as a protocol error, so every kind a handler can see is matched
//! exhaustively at the dispatch boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of request kinds the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "ping")]
    Ping,

    #[serde(rename = "version")]
    Version,

    #[serde(rename = "config.get")]
    ConfigGet,

    #[serde(rename = "config.reload")]
    ConfigReload,

    #[serde(rename = "health.get")]
    HealthGet,

    #[serde(rename = "alerts.get")]
    AlertsGet,

    #[serde(rename = "alerts.acknowledge")]
    AlertsAcknowledge,

    #[serde(rename = "alerts.dismiss")]
    AlertsDismiss,

    #[serde(rename = "shutdown")]
    Shutdown,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestKind::Ping => "ping",
            RequestKind::Version => "version",
            RequestKind::ConfigGet => "config.get",
            RequestKind::ConfigReload => "config.reload",
            RequestKind::HealthGet => "health.get",
            RequestKind::AlertsGet => "alerts.get",
            RequestKind::AlertsAcknowledge => "alerts.acknowledge",
            RequestKind::AlertsDismiss => "alerts.dismiss",
            RequestKind::Shutdown => "shutdown",
        };
        write!(f, "{name}")
    }
}

/// A single client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    pub fn with_payload(kind: RequestKind, payload: Value) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }
}

/// A single daemon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(payload: Value) -> Self {
        Self {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}
