// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for attack simulation results.

use api_abuse_limiter::limiter::{Decision, Reason};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Possible outcomes for a simulated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    RateLimited,
    ViolationBanned,
    BanEnforced,
    GlobalLimited,
}

impl From<&Decision> for Outcome {
    fn from(decision: &Decision) -> Self {
        match decision.reason {
            None => Outcome::Allowed,
            Some(Reason::RateLimited) => Outcome::RateLimited,
            Some(Reason::ViolationBan) => Outcome::ViolationBanned,
            Some(Reason::IpBanned) => Outcome::BanEnforced,
            Some(Reason::GlobalLimitExceeded) => Outcome::GlobalLimited,
        }
    }
}

/// Collects metrics during attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    outcomes: HashMap<Outcome, usize>,
    requests_per_token: HashMap<String, usize>,
    latencies: Vec<u64>,
    max_suspicion: u8,
    min_effective_limit: Option<u32>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Record one decision.
    pub fn record(&mut self, token: &str, decision: &Decision, latency: Duration) {
        *self.outcomes.entry(Outcome::from(decision)).or_insert(0) += 1;
        *self
            .requests_per_token
            .entry(token.to_string())
            .or_insert(0) += 1;
        self.latencies.push(latency.as_micros() as u64);
        self.max_suspicion = self.max_suspicion.max(decision.suspicion_score);
        self.min_effective_limit = Some(match self.min_effective_limit {
            Some(current) => current.min(decision.limit),
            None => decision.limit,
        });
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Highest suspicion score observed across all decisions.
    pub fn max_suspicion(&self) -> u8 {
        self.max_suspicion
    }

    /// Smallest effective limit advertised across all decisions.
    pub fn min_effective_limit(&self) -> Option<u32> {
        self.min_effective_limit
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Ratio of blocked to total requests.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        let allowed = self.count(Outcome::Allowed);
        (total - allowed) as f64 / total as f64
    }

    pub fn median_latency_us(&self) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    pub fn unique_tokens(&self) -> usize {
        self.requests_per_token.len()
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            allowed: self.count(Outcome::Allowed),
            rate_limited: self.count(Outcome::RateLimited),
            violation_banned: self.count(Outcome::ViolationBanned),
            ban_enforced: self.count(Outcome::BanEnforced),
            global_limited: self.count(Outcome::GlobalLimited),
            duration_ms: self.duration().as_millis() as u64,
            block_rate: self.block_rate(),
            median_latency_us: self.median_latency_us(),
            max_suspicion: self.max_suspicion,
            unique_tokens: self.unique_tokens(),
        }
    }
}

/// Summary report of attack metrics.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub allowed: usize,
    pub rate_limited: usize,
    pub violation_banned: usize,
    pub ban_enforced: usize,
    pub global_limited: usize,
    pub duration_ms: u64,
    pub block_rate: f64,
    pub median_latency_us: u64,
    pub max_suspicion: u8,
    pub unique_tokens: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Duration:          {} ms", self.duration_ms)?;
        writeln!(f, "Total Requests:    {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(
            f,
            "Allowed:           {} ({:.1}%)",
            self.allowed,
            self.allowed as f64 / self.total_requests.max(1) as f64 * 100.0
        )?;
        writeln!(f, "Rate Limited:      {}", self.rate_limited)?;
        writeln!(f, "Violation Bans:    {}", self.violation_banned)?;
        writeln!(f, "Ban Enforced:      {}", self.ban_enforced)?;
        writeln!(f, "Global Limited:    {}", self.global_limited)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f)?;
        writeln!(f, "--- Signals ---")?;
        writeln!(f, "Max Suspicion:     {}", self.max_suspicion)?;
        writeln!(f, "Median Latency:    {} us", self.median_latency_us)?;
        writeln!(f, "Unique Tokens:     {}", self.unique_tokens)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(reason: Option<Reason>, suspicion: u8) -> Decision {
        Decision {
            is_rate_limited: reason.is_some(),
            current_usage: 1,
            limit: 5,
            remaining: 4,
            is_banned: matches!(reason, Some(Reason::IpBanned | Reason::ViolationBan)),
            ban_expires_in: None,
            suspicion_score: suspicion,
            reason,
        }
    }

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AttackMetrics::new();
        metrics.start();

        metrics.record("10.0.0.1", &decision(None, 0), Duration::from_micros(100));
        metrics.record("10.0.0.1", &decision(None, 20), Duration::from_micros(150));
        metrics.record(
            "10.0.0.1",
            &decision(Some(Reason::RateLimited), 50),
            Duration::from_micros(50),
        );

        metrics.finish();

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.count(Outcome::Allowed), 2);
        assert_eq!(metrics.count(Outcome::RateLimited), 1);
        assert_eq!(metrics.unique_tokens(), 1);
        assert_eq!(metrics.max_suspicion(), 50);
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record("10.0.0.1", &decision(None, 0), Duration::ZERO);
        }
        for _ in 0..7 {
            metrics.record(
                "10.0.0.1",
                &decision(Some(Reason::IpBanned), 100),
                Duration::ZERO,
            );
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }
}
