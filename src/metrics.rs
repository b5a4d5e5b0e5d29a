// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the admission limiter service.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref CHECKS_TOTAL: IntCounter = register_int_counter!(
        "admission_checks_total",
        "Total admission checks processed"
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: IntCounter = register_int_counter!(
        "admission_rate_limited_total",
        "Checks denied by a per-client quota"
    )
    .unwrap();
    pub static ref BANNED_TOTAL: IntCounter = register_int_counter!(
        "admission_banned_total",
        "Checks denied by an active or freshly installed ban"
    )
    .unwrap();
    pub static ref GLOBAL_LIMITED_TOTAL: IntCounter = register_int_counter!(
        "admission_global_limited_total",
        "Checks denied by the process-wide ceiling"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: IntGauge = register_int_gauge!(
        "admission_tracked_clients",
        "Client records currently retained"
    )
    .unwrap();
    pub static ref BANNED_CLIENTS: IntGauge = register_int_gauge!(
        "admission_banned_clients",
        "Ban entries currently retained"
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
