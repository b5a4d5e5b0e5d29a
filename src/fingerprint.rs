// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Header fingerprinting.
//!
//! Derives a short heuristic identity from the header values a client sends
//! alongside its requests. The fingerprint is a diversity signal for
//! suspicion scoring, not a security boundary: clients that rotate their
//! headers while keeping one token accumulate distinct fingerprints, which
//! is a strong indicator of scripted traffic.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Header values folded into a client fingerprint.
///
/// Every field is optional; a missing header contributes an empty string so
/// the digest stays deterministic across callers that normalize absent
/// headers differently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSet {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub accept_language: Option<String>,
    #[serde(default)]
    pub accept_encoding: Option<String>,
    #[serde(default)]
    pub accept: Option<String>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub cache_control: Option<String>,
}

/// Derive a 16-character hex fingerprint from a header set.
///
/// Pure and deterministic: the same header values always produce the same
/// fingerprint, and changing any single field changes it.
pub fn generate_fingerprint(headers: &HeaderSet) -> String {
    let fields = [
        headers.user_agent.as_deref(),
        headers.accept_language.as_deref(),
        headers.accept_encoding.as_deref(),
        headers.accept.as_deref(),
        headers.connection.as_deref(),
        headers.cache_control.as_deref(),
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.unwrap_or("").as_bytes());
    }

    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
