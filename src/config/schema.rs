//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the launcher.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::shutdown::ShutdownTimeout;

/// Root configuration for the launcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Launcher home directory. Units live under `<home_dir>/apps`.
    pub home_dir: PathBuf,

    /// Units deployed at startup.
    pub units: Vec<String>,

    /// Hot redeploy settings.
    pub reload: ReloadConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from("."),
            units: Vec::new(),
            reload: ReloadConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LauncherConfig {
    /// Directory holding one sub-directory per unit plus the marker files.
    pub fn apps_dir(&self) -> PathBuf {
        self.home_dir.join("apps")
    }

    /// Directory holding one sub-directory of shared libraries per domain.
    pub fn shared_lib_dir(&self) -> PathBuf {
        self.home_dir.join("lib").join("shared")
    }
}

/// Hot redeploy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Fixed delay between two polls of a watched config resource, in milliseconds.
    pub interval_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { interval_ms: 3000 }
    }
}

impl ReloadConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a stop waits for in-flight work, in milliseconds.
    /// `0` waits indefinitely.
    pub timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> ShutdownTimeout {
        ShutdownTimeout::from_millis(self.timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
