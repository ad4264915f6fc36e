//! API handlers for Rentdesk REST endpoints

pub mod health;
pub mod openapi;
pub mod quotes;
pub mod reservations;
pub mod resources;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/resources", get(resources::list_resources))
        .route("/resources/:id", get(resources::get_resource))
        .route("/resources/:id/availability", get(resources::get_availability))
        .route("/sites", get(resources::list_sites))
        // Quotes
        .route("/quotes", post(quotes::create_quote))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/book", post(reservations::book_reservation))
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/approve", post(reservations::approve_reservation))
        .route("/reservations/:id/deliver", post(reservations::deliver_reservation))
        .route("/reservations/:id/return", post(reservations::return_reservation))
        .route("/reservations/:id/triage", post(reservations::triage_reservation))
        .route("/reservations/:id/resolve-maintenance", post(reservations::resolve_maintenance))
        .route("/reservations/:id/no-show", post(reservations::mark_no_show))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/reschedule", post(reservations::reschedule_reservation))
        .route("/reservations/:id/adjustments", post(reservations::apply_adjustment))
        .route("/reservations/:id/payments/upfront", post(reservations::pay_upfront))
        .route("/reservations/:id/payments/balance", post(reservations::pay_balance))
        .route("/reservations/:id/archive", post(reservations::archive_reservation))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
