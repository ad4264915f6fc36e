//! Liveness and readiness probes

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppResult;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" for liveness, "ready" once the store answers
    pub status: String,
    pub version: String,
    /// Sites visible in the store; only filled by the readiness probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sites: Option<usize>,
    /// Whether change events are mirrored to Redis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_mirroring: Option<bool>,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sites: None,
            redis_mirroring: None,
        }
    }
}

/// Process is up
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::new("healthy"))
}

/// Store reachable and catalog readable
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 500, description = "Store unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness_check(State(state): State<crate::AppState>) -> AppResult<Json<HealthResponse>> {
    let sites = state.services.catalog.list_sites().await?;
    Ok(Json(HealthResponse {
        sites: Some(sites.len()),
        redis_mirroring: Some(state.services.notifier.mirrors_to_redis()),
        ..HealthResponse::new("ready")
    }))
}
