use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{error, info, trace, warn};

use crate::ResourceKind;
use crate::util::get_socket_override;

/// IPC socket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Path of the Unix socket the daemon listens on
    pub path: String,

    /// Accept backlog requested for the listening socket
    pub backlog: u32,

    /// Per-connection read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            path: crate::util::get_default_socket_path(),
            backlog: 16,
            timeout_ms: 5000,
        }
    }
}

/// Request rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Global budget across all connections
    pub max_requests_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_sec: 100,
        }
    }
}

/// Warning/critical thresholds for one resource, in percent
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

/// Monitoring thresholds and sampling interval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub cpu: Thresholds,
    pub memory: Thresholds,
    pub disk: Thresholds,
    pub check_interval_seconds: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cpu: Thresholds {
                warning_threshold: 80.0,
                critical_threshold: 95.0,
            },
            memory: Thresholds {
                warning_threshold: 85.0,
                critical_threshold: 95.0,
            },
            disk: Thresholds {
                warning_threshold: 90.0,
                critical_threshold: 98.0,
            },
            check_interval_seconds: 30,
        }
    }
}

impl MonitoringConfig {
    pub fn thresholds(&self, kind: ResourceKind) -> Thresholds {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Memory => self.memory,
            ResourceKind::Disk => self.disk,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_log_level() -> String {
    String::from("info")
}

/// Immutable configuration snapshot.
///
/// A snapshot is never mutated after construction; a reload produces a wholly
/// new one. Every field group is individually defaulted, so a partial config
/// file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub socket: SocketConfig,
    pub rate_limit: RateLimitConfig,
    pub log_level: String,
    pub monitoring: MonitoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: SocketConfig::default(),
            rate_limit: RateLimitConfig::default(),
            log_level: default_log_level(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load a snapshot from a JSON file.
    ///
    /// Fails soft: a missing file, a parse error, or a failed validation all
    /// log and return `None`, leaving the caller on its previous snapshot (or
    /// the defaults).
    pub fn load(path: &std::path::Path) -> Option<Config> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("configuration file not found at {}: {e}", path.display());
                return None;
            }
        };

        let config = match serde_json::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to parse configuration file: {e}");
                return None;
            }
        };

        let config = config.with_env_overrides();

        if let Err(e) = config.validate() {
            error!("configuration validation failed: {e}");
            return None;
        }

        info!("configuration loaded from {}", path.display());
        Some(config)
    }

    /// Apply process-environment overrides (currently just the socket path).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = get_socket_override() {
            trace!("socket path overridden from environment: {path}");
            self.socket.path = path;
        }
        self
    }

    /// Check the snapshot invariants, naming the offending field on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.socket.path.is_empty() {
            return Err("socket.path must not be empty".into());
        }
        if self.socket.backlog == 0 {
            return Err("socket.backlog must be positive".into());
        }
        if self.socket.timeout_ms == 0 {
            return Err("socket.timeout_ms must be positive".into());
        }
        if self.rate_limit.max_requests_per_sec == 0 {
            return Err("rate_limit.max_requests_per_sec must be positive".into());
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(format!(
                "log_level must be one of {LOG_LEVELS:?}, got {:?}",
                self.log_level
            ));
        }
        for kind in ResourceKind::ALL {
            let Thresholds {
                warning_threshold,
                critical_threshold,
            } = self.monitoring.thresholds(kind);

            if !(0.0..=100.0).contains(&warning_threshold)
                || !(0.0..=100.0).contains(&critical_threshold)
            {
                return Err(format!("{kind} thresholds must be between 0 and 100"));
            }
            if warning_threshold >= critical_threshold {
                return Err(format!(
                    "{kind} warning threshold must be less than critical threshold"
                ));
            }
        }
        if self.monitoring.check_interval_seconds == 0 {
            return Err("monitoring.check_interval_seconds must be positive".into());
        }
        Ok(())
    }
}

type ChangeCallback = Arc<dyn Fn(Arc<Config>) + Send + Sync>;

struct StoreInner {
    config: Arc<Config>,
    path: Option<PathBuf>,
    callbacks: Vec<ChangeCallback>,
}

/// Shared configuration store with atomic replace-on-reload.
///
/// Change callbacks are invoked strictly outside the internal lock: the
/// snapshot and the callback list are copied out of the critical section
/// first, so a callback may call back into the store without deadlocking.
pub struct ConfigStore {
    inner: Mutex<StoreInner>,
}

impl ConfigStore {
    /// Build the store from the file at `path` if present and valid,
    /// otherwise from defaults.
    pub fn new(path: Option<PathBuf>) -> Self {
        let config = match &path {
            Some(path) => Config::load(path).unwrap_or_else(|| {
                warn!("using default configuration");
                Config::default().with_env_overrides()
            }),
            None => Config::default().with_env_overrides(),
        };

        Self {
            inner: Mutex::new(StoreInner {
                config: Arc::new(config),
                path,
                callbacks: Vec::new(),
            }),
        }
    }

    /// Current snapshot; a consistent point-in-time read, immune to a
    /// concurrent reload.
    pub fn get(&self) -> Arc<Config> {
        let inner = self.inner.lock().expect("config store lock poisoned");
        Arc::clone(&inner.config)
    }

    /// Register a callback invoked after every successful reload.
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(Arc<Config>) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("config store lock poisoned");
        inner.callbacks.push(Arc::new(callback));
    }

    /// Re-run load+validate against the configured path.
    ///
    /// On success the new snapshot is published atomically and all change
    /// callbacks run with it. On failure the previous snapshot stays active
    /// and `false` is returned.
    pub fn reload(&self) -> bool {
        let path = {
            let inner = self.inner.lock().expect("config store lock poisoned");
            match &inner.path {
                Some(path) => path.clone(),
                None => {
                    warn!("no configuration path set, cannot reload");
                    return false;
                }
            }
        };

        // Load outside the lock; file I/O must not block readers.
        let Some(config) = Config::load(&path) else {
            error!("configuration reload failed, previous snapshot retained");
            return false;
        };

        let (config, callbacks) = {
            let mut inner = self.inner.lock().expect("config store lock poisoned");
            inner.config = Arc::new(config);
            (Arc::clone(&inner.config), inner.callbacks.clone())
        };

        Self::notify(&callbacks, &config);
        info!("configuration reloaded");
        true
    }

    fn notify(callbacks: &[ChangeCallback], config: &Arc<Config>) {
        for callback in callbacks {
            let config = Arc::clone(config);
            // A panicking callback must not abort the daemon or starve the
            // callbacks registered after it.
            if std::panic::catch_unwind(AssertUnwindSafe(|| callback(config))).is_err() {
                error!("configuration change callback panicked");
            }
        }
    }
}
