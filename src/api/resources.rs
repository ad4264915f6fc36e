//! Catalog, site and availability endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{resource::AvailabilityView, Resource, Site},
};

/// Availability query window, half-open `[start_time, end_time)`
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// List rentable resources
#[utoipa::path(
    get,
    path = "/resources",
    tag = "catalog",
    responses(
        (status = 200, description = "All resources", body = Vec<Resource>)
    )
)]
pub async fn list_resources(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Resource>>> {
    let resources = state.services.catalog.list_resources().await?;
    Ok(Json(resources))
}

/// Get one resource
#[utoipa::path(
    get,
    path = "/resources/{id}",
    tag = "catalog",
    params(
        ("id" = i32, Path, description = "Resource ID")
    ),
    responses(
        (status = 200, description = "Resource", body = Resource),
        (status = 404, description = "Resource not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_resource(State(state): State<crate::AppState>, Path(id): Path<i32>) -> AppResult<Json<Resource>> {
    let resource = state.services.catalog.get_resource(id).await?;
    Ok(Json(resource))
}

/// Advisory free units over a window (may be up to one cache TTL old)
#[utoipa::path(
    get,
    path = "/resources/{id}/availability",
    tag = "catalog",
    params(
        ("id" = i32, Path, description = "Resource ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Free units", body = AvailabilityView),
        (status = 400, description = "Invalid window", body = crate::error::ErrorResponse),
        (status = 404, description = "Resource missing or inactive", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_availability(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityView>> {
    let view = state
        .services
        .catalog
        .availability(id, query.start_time, query.end_time)
        .await?;
    Ok(Json(view))
}

/// List sites with opening hours
#[utoipa::path(
    get,
    path = "/sites",
    tag = "catalog",
    responses(
        (status = 200, description = "All sites", body = Vec<Site>)
    )
)]
pub async fn list_sites(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Site>>> {
    let sites = state.services.catalog.list_sites().await?;
    Ok(Json(sites))
}
