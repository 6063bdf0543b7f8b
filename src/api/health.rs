// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Account storage availability.
    pub storage: String,
    /// Identity provider key-set status ("ok", "stale" or "unavailable").
    /// Only present when federated sign-in is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_storage(state: &AppState) -> String {
    match state.accounts.health_check().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Account storage health check failed");
            "unavailable".to_string()
        }
    }
}

/// Key-set status. Expired keys still authenticate, so `stale` does not fail
/// readiness; only a key set that was never fetched does.
async fn check_jwks(state: &AppState) -> Option<String> {
    let jwks = state.jwks()?;
    let status = match jwks.get().await {
        Ok(snapshot) if snapshot.is_fresh() => "ok",
        Ok(snapshot) => {
            tracing::warn!(
                age_secs = snapshot.age().as_secs(),
                "Serving expired identity provider key set"
            );
            "stale"
        }
        Err(e) => {
            tracing::warn!(error = %e, "Identity provider key set unavailable");
            "unavailable"
        }
    };
    Some(status.to_string())
}

/// Liveness handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness handler.
///
/// Returns 200 only if storage is available and, when federated sign-in is
/// enabled, a key set has been fetched at least once.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let storage = check_storage(&state).await;
    let jwks = check_jwks(&state).await;

    let all_ok = storage == "ok" && jwks.as_deref().is_none_or(|s| s != "unavailable");

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            storage,
            jwks,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
