//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, quotes, reservations, resources};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rentdesk API",
        version = "0.3.0",
        description = "Equipment rental reservation and pricing API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Catalog
        resources::list_resources,
        resources::get_resource,
        resources::get_availability,
        resources::list_sites,
        // Quotes
        quotes::create_quote,
        // Reservations
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::book_reservation,
        reservations::approve_reservation,
        reservations::deliver_reservation,
        reservations::return_reservation,
        reservations::triage_reservation,
        reservations::resolve_maintenance,
        reservations::mark_no_show,
        reservations::cancel_reservation,
        reservations::reschedule_reservation,
        reservations::apply_adjustment,
        reservations::pay_upfront,
        reservations::pay_balance,
        reservations::archive_reservation,
    ),
    components(
        schemas(
            // Catalog
            crate::models::Resource,
            crate::models::resource::AvailabilityView,
            crate::models::Site,
            crate::models::SiteHours,
            resources::AvailabilityQuery,
            // Quotes
            crate::models::CartLine,
            crate::models::quote::QuoteRequest,
            crate::models::quote::AppliedPromotion,
            crate::models::Quote,
            // Reservations
            crate::models::Reservation,
            crate::models::ReservationDetails,
            crate::models::LineItem,
            crate::models::Adjustment,
            crate::models::CreateReservationRequest,
            crate::models::BookReservationRequest,
            crate::models::PaymentDetails,
            crate::models::ReservationStatus,
            crate::models::AdjustmentKind,
            crate::models::PaymentMethod,
            crate::models::TriageOutcome,
            reservations::ReservationQuery,
            reservations::ReturnRequest,
            reservations::TriageRequest,
            reservations::CancelRequest,
            reservations::RescheduleRequest,
            reservations::AdjustmentRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "catalog", description = "Resources, sites and advisory availability"),
        (name = "quotes", description = "Price previews"),
        (name = "reservations", description = "Reservation lifecycle")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
