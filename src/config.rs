// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the admission limiter service.
//!
//! Defaults match the ingress policy applied to the public API endpoints.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the admission limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Admission control configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Admission control knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum number of client records tracked at once (default: 500)
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    /// Quota window length in milliseconds (default: 60000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Fold header fingerprints into suspicion scoring (default: true)
    #[serde(default = "default_true")]
    pub enable_fingerprinting: bool,

    /// Halve the effective quota per accumulated violation (default: true)
    #[serde(default = "default_true")]
    pub enable_exponential_backoff: bool,

    /// Enforce the process-wide request ceiling (default: true)
    #[serde(default = "default_true")]
    pub enable_global_limit: bool,

    /// Process-wide requests admitted per window (default: 10000)
    #[serde(default = "default_global_limit")]
    pub global_limit: u64,

    /// Violations before a ban is installed (default: 5)
    #[serde(default = "default_max_violations")]
    pub max_violations: u32,

    /// Nominal ban duration in milliseconds (default: 900000)
    #[serde(default = "default_ban_duration_ms")]
    pub ban_duration_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_tracked_clients() -> usize {
    500
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_global_limit() -> u64 {
    10_000
}

fn default_max_violations() -> u32 {
    5
}

fn default_ban_duration_ms() -> u64 {
    900_000 // 15 minutes
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            limiter: LimiterConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_tracked_clients: default_max_tracked_clients(),
            interval_ms: default_interval_ms(),
            enable_fingerprinting: default_true(),
            enable_exponential_backoff: default_true(),
            enable_global_limit: default_true(),
            global_limit: default_global_limit(),
            max_violations: default_max_violations(),
            ban_duration_ms: default_ban_duration_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl LimiterConfig {
    /// Get the quota window duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Get the nominal ban duration
    pub fn ban_duration(&self) -> Duration {
        Duration::from_millis(self.ban_duration_ms)
    }
}
