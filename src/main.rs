// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! API Abuse Limiter Service
//!
//! An adaptive admission controller for API endpoints: per-client quotas
//! shrunk by suspicion scoring, exponential-backoff bans, subnet
//! correlation, and a process-wide request ceiling.
//!
//! ## Usage
//!
//! The service runs as an external auth sidecar: a reverse proxy or API
//! middleware POSTs `{token, limit, headers?}` to `/check` and maps the
//! decision to its own denial response. Manual controls are exposed at
//! `/ban` and `/unban`, observability at `/stats` and `/metrics`.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `MAX_TRACKED_CLIENTS`: Client records tracked at once (default: 500)
//! - `INTERVAL_MS`: Quota window in milliseconds (default: 60000)
//! - `GLOBAL_LIMIT`: Process-wide requests per window (default: 10000)
//! - `MAX_VIOLATIONS`: Violations before a ban (default: 5)
//! - `BAN_DURATION_MS`: Nominal ban duration (default: 900000)

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api_abuse_limiter::{
    config::{Config, LimiterConfig},
    handlers::{self, AppState},
    limiter::Limiter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        max_tracked_clients = config.limiter.max_tracked_clients,
        interval_ms = config.limiter.interval_ms,
        global_limit = config.limiter.global_limit,
        max_violations = config.limiter.max_violations,
        ban_duration_ms = config.limiter.ban_duration_ms,
        "Starting admission limiter"
    );

    // Create application state
    let limiter = Limiter::new(config.limiter.clone());
    let state = Arc::new(AppState {
        limiter,
        config: config.clone(),
    });

    // Build router
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route("/check", post(handlers::check))
        .route("/ban", post(handlers::ban))
        .route("/unban", post(handlers::unban))
        .route("/stats", get(handlers::stats));
    if config.metrics.enabled {
        app = app.route(&config.metrics.path, get(handlers::metrics_handler));
    }
    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    Config {
        bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        limiter: LimiterConfig {
            max_tracked_clients: std::env::var("MAX_TRACKED_CLIENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            interval_ms: std::env::var("INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60_000),
            enable_fingerprinting: std::env::var("ENABLE_FINGERPRINTING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            enable_exponential_backoff: std::env::var("ENABLE_EXPONENTIAL_BACKOFF")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            enable_global_limit: std::env::var("ENABLE_GLOBAL_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            global_limit: std::env::var("GLOBAL_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            max_violations: std::env::var("MAX_VIOLATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            ban_duration_ms: std::env::var("BAN_DURATION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900_000),
        },
        ..Default::default()
    }
}
