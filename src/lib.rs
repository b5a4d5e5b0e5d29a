// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! API Abuse Limiter
//!
//! This crate provides an adaptive admission layer for API endpoints,
//! defending against scripted and botnet-style clients:
//!
//! - Per-client quotas over a fixed window
//! - Multi-signal suspicion scoring (spacing, bursts, identity rotation,
//!   timing regularity)
//! - Exponential-backoff banning once violations accumulate
//! - Subnet-level correlation of violations across clients
//! - A process-wide request ceiling layered over per-client quotas
//!
//! State is in-memory, capacity-bounded, and process-local: each instance
//! enforces its own view of limits, and losing a record to eviction is
//! fail-open by design.

pub mod config;
pub mod fingerprint;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod score;
pub mod store;

pub use config::{Config, LimiterConfig};
pub use fingerprint::{generate_fingerprint, HeaderSet};
pub use limiter::{Decision, Limiter, Reason, Stats};
