// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the admission limiter service.
//!
//! The service operates as an external auth sidecar: a reverse proxy or
//! API middleware POSTs the client token and quota to `/check` and maps
//! the decision onto its own denial response. It owns no wire-format or
//! transport concerns beyond this JSON surface.

use crate::config::Config;
use crate::fingerprint::{generate_fingerprint, HeaderSet};
use crate::limiter::{Decision, Limiter, Reason};
use crate::metrics;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: Limiter,
    pub config: Config,
}

/// Request-shape errors, surfaced to the caller as 400 responses.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("token must not be empty")]
    EmptyToken,

    #[error("limit must be at least 1")]
    ZeroLimit,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Admission check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Abuse-tracking key, typically the client IP
    pub token: String,
    /// Nominal quota for the endpoint being protected
    pub limit: u32,
    /// Header values for fingerprinting, when available
    #[serde(default)]
    pub headers: Option<HeaderSet>,
}

/// Admission check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub current_usage: u32,
    pub limit: u32,
    pub remaining: u32,
    pub is_banned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_expires_in_ms: Option<u64>,
    pub suspicion_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        Self {
            allowed: !decision.is_rate_limited && !decision.is_banned,
            current_usage: decision.current_usage,
            limit: decision.limit,
            remaining: decision.remaining,
            is_banned: decision.is_banned,
            ban_expires_in_ms: decision.ban_expires_in.map(|d| d.as_millis() as u64),
            suspicion_score: decision.suspicion_score,
            reason: decision.reason.map(|r| r.as_str()),
        }
    }
}

/// Manual ban request.
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub token: String,
    /// Ban length; the configured duration applies when omitted
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Manual unban request.
#[derive(Debug, Deserialize)]
pub struct UnbanRequest {
    pub token: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Stats snapshot response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub global_requests: u64,
    pub tracked_clients: usize,
    pub banned_clients: usize,
    pub timestamp: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "api-abuse-limiter",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Run the admission pipeline for one request.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Response {
    if let Err(err) = validate(&req) {
        warn!(token = %req.token, error = %err, "Malformed check request");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
                code: "BAD_REQUEST",
            }),
        )
            .into_response();
    }

    let fingerprint = req.headers.as_ref().map(generate_fingerprint);

    metrics::CHECKS_TOTAL.inc();
    let decision = state
        .limiter
        .check(req.limit, &req.token, fingerprint.as_deref());

    match decision.reason {
        Some(Reason::GlobalLimitExceeded) => metrics::GLOBAL_LIMITED_TOTAL.inc(),
        Some(Reason::IpBanned) | Some(Reason::ViolationBan) => metrics::BANNED_TOTAL.inc(),
        Some(Reason::RateLimited) => metrics::RATE_LIMITED_TOTAL.inc(),
        None => {}
    }
    let stats = state.limiter.stats();
    metrics::TRACKED_CLIENTS.set(stats.tracked_clients as i64);
    metrics::BANNED_CLIENTS.set(stats.banned_clients as i64);

    debug!(
        token = %req.token,
        allowed = !decision.is_rate_limited && !decision.is_banned,
        suspicion = decision.suspicion_score,
        "Admission decision"
    );
    (StatusCode::OK, Json(CheckResponse::from(decision))).into_response()
}

/// Install a manual ban.
pub async fn ban(State(state): State<Arc<AppState>>, Json(req): Json<BanRequest>) -> Response {
    if req.token.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: RequestError::EmptyToken.to_string(),
                code: "BAD_REQUEST",
            }),
        )
            .into_response();
    }

    state
        .limiter
        .ban(&req.token, req.duration_ms.map(Duration::from_millis));
    StatusCode::NO_CONTENT.into_response()
}

/// Lift a manual or violation ban.
pub async fn unban(State(state): State<Arc<AppState>>, Json(req): Json<UnbanRequest>) -> Response {
    let removed = state.limiter.unban(&req.token);
    if !removed {
        info!(token = %req.token, "Unban requested for token with no ban entry");
    }
    Json(serde_json::json!({ "removed": removed })).into_response()
}

/// Read-only stats snapshot.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.limiter.stats();
    Json(StatsResponse {
        global_requests: stats.global_requests,
        tracked_clients: stats.tracked_clients,
        banned_clients: stats.banned_clients,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    metrics::render()
}

fn validate(req: &CheckRequest) -> Result<(), RequestError> {
    if req.token.trim().is_empty() {
        return Err(RequestError::EmptyToken);
    }
    if req.limit == 0 {
        return Err(RequestError::ZeroLimit);
    }
    Ok(())
}
