// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use api_abuse_limiter::fingerprint::HeaderSet;
use std::time::Duration;

/// Generate a pool of token strings spread across the 10.0.0.0/8 range.
pub fn generate_tokens(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            format!("10.{a}.{b}.{c}")
        })
        .collect()
}

/// Generate tokens that all share one /24 prefix.
pub fn generate_subnet_tokens(count: usize, prefix: &str) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}.{i}")).collect()
}

/// Generate header sets that differ per index, modelling a client that
/// rotates its presented identity.
pub fn generate_rotating_headers(count: usize) -> Vec<HeaderSet> {
    (0..count)
        .map(|i| HeaderSet {
            user_agent: Some(format!("Mozilla/5.0 (Build {i})")),
            accept_language: Some("en-US,en;q=0.5".to_string()),
            accept_encoding: Some("gzip, deflate".to_string()),
            accept: Some("*/*".to_string()),
            connection: Some("keep-alive".to_string()),
            cache_control: None,
        })
        .collect()
}

/// Deterministic human-ish delays: 100-197ms with enough spread that the
/// interval variance never looks machine-regular.
pub fn jittered_delay(index: usize) -> Duration {
    Duration::from_millis(100 + ((index as u64 * 37) % 97))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_tokens_unique() {
        let tokens = generate_tokens(300);
        let unique: std::collections::HashSet<_> = tokens.iter().collect();
        assert_eq!(unique.len(), 300);
    }

    #[test]
    fn test_subnet_tokens_share_prefix() {
        let tokens = generate_subnet_tokens(10, "203.0.113");
        assert!(tokens.iter().all(|t| t.starts_with("203.0.113.")));
    }

    #[test]
    fn test_rotating_headers_differ() {
        let sets = generate_rotating_headers(5);
        assert_ne!(sets[0], sets[1]);
    }

    #[test]
    fn test_jittered_delays_vary() {
        let unique: std::collections::HashSet<_> =
            (0..10).map(|i| jittered_delay(i).as_millis()).collect();
        assert!(unique.len() > 5);
    }
}
