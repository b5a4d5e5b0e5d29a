// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Suspicion scoring.
//!
//! A pure heuristic estimate of how bot-like a client's request pattern
//! looks, combining request spacing, identity rotation, accumulated
//! violations, burst volume, and timing regularity into a single 0-100
//! score. Each signal is weak on its own; the sum is what matters.

use crate::store::ClientRecord;
use std::time::{Duration, Instant};

/// Spacing below this between consecutive requests is machine-fast.
const FAST_REPEAT: Duration = Duration::from_millis(50);
/// Spacing below this is still faster than human interaction.
const QUICK_REPEAT: Duration = Duration::from_millis(100);
/// Window over which burst volume is measured.
const BURST_WINDOW: Duration = Duration::from_millis(1000);
/// Requests inside the burst window that carry no penalty.
const BURST_FREE_REQUESTS: usize = 10;
/// Distinct fingerprints that carry no penalty.
const FINGERPRINT_FREE_COUNT: usize = 5;
/// Most recent timestamps sampled for regularity analysis.
const REGULARITY_SAMPLE: usize = 10;
/// Minimum interval samples before regularity is judged.
const REGULARITY_MIN_INTERVALS: usize = 5;
/// Interval variance (ms squared) below which spacing is near-constant.
const REGULARITY_VARIANCE: f64 = 100.0;

/// Score a usage record at `now`, clamped to 0..=100.
///
/// `record.last_request` must still hold the previous request's time; the
/// admission pipeline assigns the current time only after scoring, so a
/// fresh record scores zero.
pub fn score(record: &ClientRecord, now: Instant) -> u8 {
    let mut score: u64 = 0;

    // Sub-100ms spacing between consecutive requests.
    if let Some(last) = record.last_request {
        let gap = now.saturating_duration_since(last);
        if gap < FAST_REPEAT {
            score += 20;
        } else if gap < QUICK_REPEAT {
            score += 10;
        }
    }

    // Rotating identities: one token presenting many header fingerprints.
    if record.fingerprints.len() > FINGERPRINT_FREE_COUNT {
        score += 15 * (record.fingerprints.len() - FINGERPRINT_FREE_COUNT) as u64;
    }

    // Accumulated violations; the final clamp is the only cap.
    score += 25 * u64::from(record.violations);

    // Burst volume inside the last second.
    let recent = record
        .timestamps
        .iter()
        .filter(|t| now.saturating_duration_since(**t) < BURST_WINDOW)
        .count();
    if recent > BURST_FREE_REQUESTS {
        score += 5 * (recent - BURST_FREE_REQUESTS) as u64;
    }

    // Near-constant spacing indicates scripted traffic.
    if record.timestamps.len() >= 3 {
        let tail: Vec<Instant> = record
            .timestamps
            .iter()
            .rev()
            .take(REGULARITY_SAMPLE)
            .rev()
            .copied()
            .collect();
        let intervals: Vec<f64> = tail
            .windows(2)
            .map(|w| w[1].saturating_duration_since(w[0]).as_secs_f64() * 1000.0)
            .collect();
        if intervals.len() >= REGULARITY_MIN_INTERVALS && variance(&intervals) < REGULARITY_VARIANCE
        {
            score += 30;
        }
    }

    score.min(100) as u8
}

fn variance(samples: &[f64]) -> f64 {
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64
}
