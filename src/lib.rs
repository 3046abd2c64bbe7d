pub mod actors;
pub mod alerts;
pub mod config;
pub mod ipc;
pub mod monitors;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource kinds the daemon samples and classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Disk,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] =
        [ResourceKind::Cpu, ResourceKind::Memory, ResourceKind::Disk];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::Memory => write!(f, "memory"),
            ResourceKind::Disk => write!(f, "disk"),
        }
    }
}

/// Classified status of a single resource.
///
/// `Unknown` covers the window before the first sample completes and any tick
/// where the underlying OS read failed or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Ok => write!(f, "ok"),
            ResourceStatus::Warning => write!(f, "warning"),
            ResourceStatus::Critical => write!(f, "critical"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Utilization and classification of one resource at one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Utilization percentage, `None` if the read failed this tick.
    pub value: Option<f64>,

    pub status: ResourceStatus,
}

impl ResourceSample {
    pub fn unknown() -> Self {
        Self {
            value: None,
            status: ResourceStatus::Unknown,
        }
    }
}

/// Latest health of the host, one entry per resource kind.
///
/// Single-slot state: each sampling tick replaces the previous snapshot
/// wholesale, so readers always observe a complete snapshot from one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub cpu: ResourceSample,
    pub memory: ResourceSample,
    pub disk: ResourceSample,

    /// When the snapshot was taken, `None` before the first tick.
    pub sampled_at: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// The snapshot reported before the first sampling tick completes.
    pub fn unknown() -> Self {
        Self {
            cpu: ResourceSample::unknown(),
            memory: ResourceSample::unknown(),
            disk: ResourceSample::unknown(),
            sampled_at: None,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &ResourceSample {
        match kind {
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
            ResourceKind::Disk => &self.disk,
        }
    }
}
