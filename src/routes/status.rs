//! Liveness, readiness, and metrics endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use super::MonitorState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
struct ReadinessChecks {
    connected: bool,
}

pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Ready iff the feed connection is currently up. Total connectivity loss
/// is the one user-visible failure mode; it surfaces here and in stats.
pub async fn readyz(State(state): State<MonitorState>) -> impl IntoResponse {
    let connected = *state.connected.borrow();

    if !connected {
        warn!("Feed readiness check failed");
    }

    let status_code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadyResponse {
            status: if connected { "ready" } else { "not_ready" },
            checks: ReadinessChecks { connected },
        }),
    )
}

pub async fn metrics_endpoint(State(state): State<MonitorState>) -> impl IntoResponse {
    state.metrics_handle.render()
}
