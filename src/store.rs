// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bounded in-memory abuse-tracking state.
//!
//! Four stores back the admission controller:
//!
//! - [`ClientStore`]: per-token usage records, LRU-evicted under pressure
//! - [`BanStore`]: ban entries, retained past their enforcement window
//! - [`SubnetTracker`]: violation tallies per IPv4 dotted prefix
//! - [`GlobalCounter`]: process-wide fixed-window request counter
//!
//! All expiry is lazy: entries are compared against the caller's clock on
//! lookup instead of being purged by a background timer. Every store is
//! capacity-bounded, and losing an entry to eviction is fail-open: the
//! client's history resets rather than the request failing.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Request timestamps retained per record.
pub(crate) const TIMESTAMP_CAP: usize = 100;
/// Distinct fingerprints retained per record.
pub(crate) const FINGERPRINT_CAP: usize = 8;
/// Ban entries retained at once.
pub(crate) const BAN_CAPACITY: usize = 10_000;
/// Subnet tallies retained at once.
pub(crate) const SUBNET_CAPACITY: usize = 1_000;
/// Lifetime of a subnet tally, refreshed on every violation.
pub(crate) const SUBNET_TTL: Duration = Duration::from_secs(300);
/// Tally above which a subnet is treated as coordinated.
pub(crate) const SUBNET_ALERT_THRESHOLD: u32 = 10;

/// Mutable usage record for one client token.
///
/// Owned exclusively by its [`ClientStore`] slot; the admission pipeline
/// mutates it in place and no reference escapes the controller.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Requests seen over the record's lifetime.
    pub count: u32,
    /// Recent request times, oldest first, capped at 100.
    pub timestamps: VecDeque<Instant>,
    /// Quota violations accumulated by this record.
    pub violations: u32,
    /// Distinct header fingerprints seen, capacity-bounded.
    pub fingerprints: Vec<String>,
    /// Time of the previous request, if any.
    pub last_request: Option<Instant>,
    /// Last computed suspicion score.
    pub suspicion_score: u8,
    expires_at: Instant,
    last_access: Instant,
}

impl ClientRecord {
    fn new(now: Instant, ttl: Duration) -> Self {
        Self {
            count: 0,
            timestamps: VecDeque::new(),
            violations: 0,
            fingerprints: Vec::new(),
            last_request: None,
            suspicion_score: 0,
            expires_at: now + ttl,
            last_access: now,
        }
    }

    /// Record one request time, dropping the oldest beyond the cap.
    pub fn push_timestamp(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        if self.timestamps.len() > TIMESTAMP_CAP {
            self.timestamps.pop_front();
        }
    }

    /// Remember a fingerprint. The set is capacity-bounded; once full, new
    /// values are dropped rather than displacing older ones, which keeps
    /// the diversity signal stable for long-lived records.
    pub fn add_fingerprint(&mut self, fingerprint: &str) {
        if self.fingerprints.iter().any(|f| f == fingerprint) {
            return;
        }
        if self.fingerprints.len() < FINGERPRINT_CAP {
            self.fingerprints.push(fingerprint.to_string());
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(now: Instant) -> Self {
        Self::new(now, Duration::from_secs(60))
    }
}

/// Bounded, lazily expired store of per-client usage records.
pub struct ClientStore {
    capacity: usize,
    ttl: Duration,
    records: HashMap<String, ClientRecord>,
}

impl ClientStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            records: HashMap::new(),
        }
    }

    /// Fetch or insert the record for `token`, reporting whether it was
    /// freshly created.
    ///
    /// Records expire a fixed interval after creation, not after last
    /// access; an expired record is dropped and recreated on lookup. At
    /// capacity, expired entries are swept first and the least-recently
    /// used survivor is evicted if the store is still full.
    pub fn get_or_create(&mut self, token: &str, now: Instant) -> (&mut ClientRecord, bool) {
        if self.records.get(token).is_some_and(|r| r.expires_at <= now) {
            self.records.remove(token);
        }

        let created = !self.records.contains_key(token);
        if created && self.records.len() >= self.capacity {
            self.evict(now);
        }

        let ttl = self.ttl;
        let record = self
            .records
            .entry(token.to_string())
            .or_insert_with(|| ClientRecord::new(now, ttl));
        record.last_access = now;
        (record, created)
    }

    fn evict(&mut self, now: Instant) {
        self.records.retain(|_, r| r.expires_at > now);
        if self.records.len() < self.capacity {
            return;
        }
        let victim = self
            .records
            .iter()
            .min_by_key(|(_, r)| r.last_access)
            .map(|(token, _)| token.clone());
        if let Some(token) = victim {
            debug!(token = %token, "Evicting least-recently-used client record");
            self.records.remove(&token);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Active or recently expired ban for one token.
#[derive(Debug, Clone)]
pub struct BanEntry {
    /// When enforcement ends.
    pub until: Instant,
    /// Violation count at the time the ban was installed.
    pub violations: u32,
    expires_at: Instant,
}

/// Bounded store of ban entries.
///
/// Entries are retained for twice their ban duration so that a just-expired
/// ban can still seed violation history into a recreated client record.
/// Being banned is always `until > now`, never mere presence of an entry.
pub struct BanStore {
    capacity: usize,
    entries: HashMap<String, BanEntry>,
}

impl BanStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Install or overwrite a ban lasting `duration`.
    pub fn insert(&mut self, token: &str, violations: u32, duration: Duration, now: Instant) {
        if !self.entries.contains_key(token) && self.entries.len() >= self.capacity {
            self.entries.retain(|_, e| e.expires_at > now);
            if self.entries.len() >= self.capacity {
                let victim = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(t, _)| t.clone());
                if let Some(t) = victim {
                    debug!(token = %t, "Evicting oldest ban entry");
                    self.entries.remove(&t);
                }
            }
        }
        self.entries.insert(
            token.to_string(),
            BanEntry {
                until: now + duration,
                violations,
                expires_at: now + duration * 2,
            },
        );
    }

    /// Look up a retained entry, dropping it once its retention deadline
    /// has passed. The returned entry may already be past enforcement.
    pub fn get(&mut self, token: &str, now: Instant) -> Option<&BanEntry> {
        if self.entries.get(token).is_some_and(|e| e.expires_at <= now) {
            self.entries.remove(token);
        }
        self.entries.get(token)
    }

    /// The ban currently in force for `token`, if any.
    pub fn active(&mut self, token: &str, now: Instant) -> Option<&BanEntry> {
        self.get(token, now).filter(|e| e.until > now)
    }

    /// Lift any ban on `token`. Returns whether an entry was removed.
    pub fn remove(&mut self, token: &str) -> bool {
        self.entries.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide fixed-window request counter.
pub struct GlobalCounter {
    total: u64,
    window_start: Instant,
}

impl GlobalCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            total: 0,
            window_start: now,
        }
    }

    /// Count one request against the window, resetting the window first if
    /// it has elapsed. Returns false when the post-increment total exceeds
    /// `limit`.
    pub fn admit(&mut self, limit: u64, interval: Duration, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) > interval {
            self.total = 0;
            self.window_start = now;
        }
        self.total += 1;
        self.total <= limit
    }

    /// Requests counted in the current window.
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[derive(Debug, Clone)]
struct SubnetState {
    count: u32,
    expires_at: Instant,
}

/// Violation tallies per IPv4 dotted prefix.
///
/// A correlation signal only: many distinct addresses from one neighbourhood
/// being throttled at once reads as coordinated abuse. A tally never causes
/// a ban by itself.
pub struct SubnetTracker {
    capacity: usize,
    ttl: Duration,
    tallies: HashMap<String, SubnetState>,
}

impl SubnetTracker {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            tallies: HashMap::new(),
        }
    }

    /// Record a violation for the token's subnet, refreshing the tally's
    /// lifetime. Returns true when the tally has climbed past the alert
    /// threshold. Tokens without a dotted IPv4 shape carry no subnet
    /// signal and are skipped.
    pub fn record_violation(&mut self, token: &str, now: Instant) -> bool {
        let Some(prefix) = subnet_prefix(token) else {
            return false;
        };

        if self.tallies.get(&prefix).is_some_and(|s| s.expires_at <= now) {
            self.tallies.remove(&prefix);
        }
        if !self.tallies.contains_key(&prefix) && self.tallies.len() >= self.capacity {
            self.tallies.retain(|_, s| s.expires_at > now);
            if self.tallies.len() >= self.capacity {
                let victim = self
                    .tallies
                    .iter()
                    .min_by_key(|(_, s)| s.expires_at)
                    .map(|(p, _)| p.clone());
                if let Some(p) = victim {
                    self.tallies.remove(&p);
                }
            }
        }

        let ttl = self.ttl;
        let state = self.tallies.entry(prefix).or_insert(SubnetState {
            count: 0,
            expires_at: now + ttl,
        });
        state.count += 1;
        state.expires_at = now + ttl;
        state.count > SUBNET_ALERT_THRESHOLD
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }
}

/// First three dot-separated segments of the token, or `None` when that
/// prefix would equal the whole token (non-IPv4-shaped tokens).
fn subnet_prefix(token: &str) -> Option<String> {
    let prefix = token
        .splitn(4, '.')
        .take(3)
        .collect::<Vec<_>>()
        .join(".");
    (prefix != token).then_some(prefix)
}
