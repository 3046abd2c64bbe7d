use sysinfo::{Disks, System};
use tracing::trace;

use crate::ResourceStatus;
use crate::config::Thresholds;

/// Classify a utilization percentage against a pair of thresholds.
///
/// `value < warning` is `Ok`, `warning <= value < critical` is `Warning`,
/// `value >= critical` is `Critical`.
pub fn classify(value: f64, thresholds: Thresholds) -> ResourceStatus {
    if value >= thresholds.critical_threshold {
        ResourceStatus::Critical
    } else if value >= thresholds.warning_threshold {
        ResourceStatus::Warning
    } else {
        ResourceStatus::Ok
    }
}

/// Raw utilization percentages for one tick.
///
/// `None` marks a resource whose read failed this tick; the other resources
/// are unaffected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Readings {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub disk: Option<f64>,
}

/// Source of raw resource utilization.
///
/// The seam between the sampling loop and the OS: production uses
/// [`SystemSampler`], tests inject scripted readings.
pub trait Sampler: Send + 'static {
    fn sample(&mut self) -> Readings;
}

/// Sampler backed by `sysinfo`.
///
/// The `System` handle is kept across ticks so CPU usage is computed from the
/// delta since the previous refresh.
pub struct SystemSampler {
    sys: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }

    fn cpu_usage(&mut self) -> Option<f64> {
        self.sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.sys.refresh_cpu_usage();

        let cpus = self.sys.cpus();
        if cpus.is_empty() {
            return None;
        }

        let total: f64 = cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum();
        Some(total / cpus.len() as f64)
    }

    fn memory_usage(&mut self) -> Option<f64> {
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        if total == 0 {
            return None;
        }

        Some(self.sys.used_memory() as f64 / total as f64 * 100.0)
    }

    fn disk_usage(&self) -> Option<f64> {
        let disks = Disks::new_with_refreshed_list();

        let (total, available) = disks
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });

        if total == 0 {
            return None;
        }

        Some((total - available) as f64 / total as f64 * 100.0)
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SystemSampler {
    fn sample(&mut self) -> Readings {
        let readings = Readings {
            cpu: self.cpu_usage(),
            memory: self.memory_usage(),
            disk: self.disk_usage(),
        };
        trace!("sampled resources: {readings:?}");
        readings
    }
}
