// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Adaptive admission controller.
//!
//! Implements layered request admission:
//! 1. Process-wide request ceiling (fixed window)
//! 2. Ban enforcement with exponential backoff
//! 3. Per-client quota, shrunk as the suspicion score climbs
//! 4. Subnet-level correlation of violations
//!
//! A check is synchronous and never suspends: all state lives behind one
//! mutex owned by the [`Limiter`], and every operation is bounded by the
//! per-record history cap.

use crate::config::LimiterConfig;
use crate::score;
use crate::store::{
    BanStore, ClientStore, GlobalCounter, SubnetTracker, BAN_CAPACITY, SUBNET_CAPACITY, SUBNET_TTL,
};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The process-wide request ceiling was exceeded
    GlobalLimitExceeded,
    /// The token is under an active ban
    IpBanned,
    /// This request pushed the token over the violation threshold
    ViolationBan,
    /// The per-client quota was exceeded
    RateLimited,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobalLimitExceeded => "global_limit_exceeded",
            Self::IpBanned => "ip_banned",
            Self::ViolationBan => "violation_ban",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the request exceeded its quota
    pub is_rate_limited: bool,
    /// Requests counted against this record so far
    pub current_usage: u32,
    /// Effective quota after suspicion and backoff adjustments
    pub limit: u32,
    /// Requests left before the quota trips
    pub remaining: u32,
    /// Whether the token is banned
    pub is_banned: bool,
    /// Time until an active or freshly installed ban lifts
    pub ban_expires_in: Option<Duration>,
    /// Suspicion score attached to this decision
    pub suspicion_score: u8,
    /// Denial reason, absent when the request is admitted
    pub reason: Option<Reason>,
}

/// Read-only snapshot of limiter state.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    /// Requests counted in the current global window
    pub global_requests: u64,
    /// Client records currently retained
    pub tracked_clients: usize,
    /// Ban entries currently retained
    pub banned_clients: usize,
}

struct LimiterState {
    clients: ClientStore,
    bans: BanStore,
    subnets: SubnetTracker,
    global: GlobalCounter,
}

/// Adaptive admission controller.
///
/// One instance owns all abuse-tracking state for the process. Construct it
/// once at startup and share it by `Arc`; checks for different tokens
/// contend only briefly on the state mutex.
pub struct Limiter {
    config: LimiterConfig,
    state: Mutex<LimiterState>,
}

impl Limiter {
    /// Create a limiter with the given configuration.
    pub fn new(config: LimiterConfig) -> Self {
        let now = Instant::now();
        let state = LimiterState {
            clients: ClientStore::new(config.max_tracked_clients, config.interval()),
            bans: BanStore::new(BAN_CAPACITY),
            subnets: SubnetTracker::new(SUBNET_CAPACITY, SUBNET_TTL),
            global: GlobalCounter::new(now),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Run the admission pipeline for one request.
    ///
    /// `limit` is the caller's nominal quota for this endpoint, `token` the
    /// abuse-tracking key (typically the client IP), and `fingerprint` an
    /// optional header fingerprint from
    /// [`generate_fingerprint`](crate::fingerprint::generate_fingerprint).
    pub fn check(&self, limit: u32, token: &str, fingerprint: Option<&str>) -> Decision {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        // The process-wide ceiling runs first, before any per-client state
        // is touched.
        if self.config.enable_global_limit
            && !state
                .global
                .admit(self.config.global_limit, self.config.interval(), now)
        {
            warn!(token = %token, "Process-wide request ceiling exceeded");
            return Decision {
                is_rate_limited: true,
                current_usage: 0,
                limit,
                remaining: 0,
                is_banned: false,
                ban_expires_in: None,
                suspicion_score: 0,
                reason: Some(Reason::GlobalLimitExceeded),
            };
        }

        // An active ban short-circuits the quota pipeline entirely.
        if let Some(entry) = state.bans.active(token, now) {
            let expires_in = entry.until.saturating_duration_since(now);
            debug!(
                token = %token,
                expires_in_ms = expires_in.as_millis() as u64,
                "Request from banned token"
            );
            return Decision {
                is_rate_limited: true,
                current_usage: 0,
                limit,
                remaining: 0,
                is_banned: true,
                ban_expires_in: Some(expires_in),
                suspicion_score: 100,
                reason: Some(Reason::IpBanned),
            };
        }

        // A retained ban entry, active or not, seeds violation history into
        // a recreated record: serving out a ban leaves a residual penalty.
        let seeded_violations = state.bans.get(token, now).map(|e| e.violations);

        let (record, created) = state.clients.get_or_create(token, now);
        if created {
            if let Some(violations) = seeded_violations {
                debug!(
                    token = %token,
                    violations,
                    "Seeding fresh record from retained ban entry"
                );
                record.violations = violations;
            }
        }

        if self.config.enable_fingerprinting {
            if let Some(fp) = fingerprint {
                record.add_fingerprint(fp);
            }
        }

        record.push_timestamp(now);
        record.count += 1;

        // Score against the previous request's spacing, then advance it.
        let mut suspicion = score::score(record, now);
        record.suspicion_score = suspicion;
        record.last_request = Some(now);

        let mut effective = effective_limit(limit, suspicion);
        if self.config.enable_exponential_backoff && record.violations > 0 {
            effective = (effective >> record.violations.min(5)).max(1);
        }

        let count = record.count;
        let is_rate_limited = count > effective;

        if is_rate_limited {
            record.violations += 1;
            let violations = record.violations;
            debug!(token = %token, violations, effective, "Per-client quota exceeded");

            // Many neighbouring addresses being throttled at once reads as
            // coordinated abuse; bump the offender's score.
            if state.subnets.record_violation(token, now) {
                suspicion = suspicion.saturating_add(20).min(100);
                record.suspicion_score = suspicion;
                info!(token = %token, suspicion, "Subnet coordination bonus applied");
            }

            if violations >= self.config.max_violations {
                let duration = if self.config.enable_exponential_backoff {
                    let doublings = (violations - self.config.max_violations).min(4);
                    self.config.ban_duration() * 2u32.pow(doublings)
                } else {
                    self.config.ban_duration()
                };
                state.bans.insert(token, violations, duration, now);
                warn!(
                    token = %token,
                    violations,
                    duration_ms = duration.as_millis() as u64,
                    "Violation threshold reached, banning token"
                );
                return Decision {
                    is_rate_limited: true,
                    current_usage: count,
                    limit: effective,
                    remaining: 0,
                    is_banned: true,
                    ban_expires_in: Some(duration),
                    suspicion_score: suspicion,
                    reason: Some(Reason::ViolationBan),
                };
            }
        }

        Decision {
            is_rate_limited,
            current_usage: count,
            limit: effective,
            remaining: effective.saturating_sub(count),
            is_banned: false,
            ban_expires_in: None,
            suspicion_score: suspicion,
            reason: is_rate_limited.then_some(Reason::RateLimited),
        }
    }

    /// Force a ban regardless of quota history. `duration` defaults to the
    /// configured ban duration.
    pub fn ban(&self, token: &str, duration: Option<Duration>) {
        let duration = duration.unwrap_or_else(|| self.config.ban_duration());
        let now = Instant::now();
        self.state
            .lock()
            .bans
            .insert(token, self.config.max_violations, duration, now);
        info!(
            token = %token,
            duration_ms = duration.as_millis() as u64,
            "Token banned manually"
        );
    }

    /// Lift any ban on `token`; the ordinary quota still applies. Returns
    /// whether a ban entry was removed.
    pub fn unban(&self, token: &str) -> bool {
        let removed = self.state.lock().bans.remove(token);
        if removed {
            info!(token = %token, "Token unbanned");
        }
        removed
    }

    /// Snapshot global request count and store sizes. Mutates nothing, so
    /// sizes may include entries that are expired but not yet swept.
    pub fn stats(&self) -> Stats {
        let guard = self.state.lock();
        Stats {
            global_requests: guard.global.total(),
            tracked_clients: guard.clients.len(),
            banned_clients: guard.bans.len(),
        }
    }

    /// The configuration this limiter was built with.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }
}

/// Shrink the nominal quota as suspicion climbs. The floors keep heavily
/// suspected but unproven clients from being starved outright.
fn effective_limit(limit: u32, suspicion: u8) -> u32 {
    if suspicion > 50 {
        (limit / 2).max(5)
    } else if suspicion > 25 {
        ((u64::from(limit) * 3 / 4) as u32).max(10)
    } else {
        limit
    }
}
