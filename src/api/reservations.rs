//! Reservation endpoints
//!
//! Role checks happen in the lifecycle engine; handlers only authenticate,
//! validate the body and build the request context.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        BookReservationRequest, CreateReservationRequest, PaymentDetails, Reservation, ReservationDetails,
        ReservationStatus, TriageOutcome,
    },
};

use super::AuthenticatedUser;

/// Reservation list filters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ReservationQuery {
    /// Staff only; customers always see their own
    pub customer_id: Option<i32>,
    pub status: Option<ReservationStatus>,
}

/// Return request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Defaults to now
    pub actual_return_time: Option<DateTime<Utc>>,
}

/// Inspection result after cleaning
#[derive(Debug, Deserialize, ToSchema)]
pub struct TriageRequest {
    pub outcome: TriageOutcome,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RescheduleRequest {
    pub new_start_time: DateTime<Utc>,
    /// weather, force-majeure and system-error waive the fee
    #[validate(length(min = 1, max = 200, message = "Reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustmentRequest {
    /// Signed percentage of (total - deposit); negative is a discount
    #[schema(value_type = String)]
    pub percentage: Decimal,
    #[validate(length(min = 1, max = 500, message = "Reason is required"))]
    pub reason: String,
}

/// List reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservations, newest start first", body = Vec<Reservation>),
        (status = 403, description = "Customer asked for someone else's reservations", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<Vec<Reservation>>> {
    let reservations = state
        .services
        .reservations
        .list(&claims.context(), query.customer_id, query.status)
        .await?;
    Ok(Json(reservations))
}

/// Get a reservation with line items and adjustments
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ReservationDetails),
        (status = 404, description = "Reservation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state.services.reservations.get(&claims.context(), id).await?;
    Ok(Json(details))
}

/// Create a PENDING reservation
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationDetails),
        (status = 400, description = "Invalid cart", body = crate::error::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::error::ErrorResponse),
        (status = 422, description = "Outside business hours", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ReservationDetails>)> {
    request.validate()?;

    let details = state.services.reservations.create(&claims.context(), &request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Create a reservation and capture its upfront payment
#[utoipa::path(
    post,
    path = "/reservations/book",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = BookReservationRequest,
    responses(
        (status = 201, description = "Reservation created and paid upfront", body = ReservationDetails),
        (status = 502, description = "Payment failed; reservation cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BookReservationRequest>,
) -> AppResult<(StatusCode, Json<ReservationDetails>)> {
    request.validate()?;

    let details = state
        .services
        .reservations
        .book(&claims.context(), &request.reservation, &request.payment)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Approve a paid reservation for delivery (PENDING -> READY)
#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation ready", body = ReservationDetails),
        (status = 402, description = "Upfront amount not paid", body = crate::error::ErrorResponse),
        (status = 422, description = "Too early to approve", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state
        .services
        .reservations
        .approve_for_delivery(&claims.context(), id)
        .await?;
    Ok(Json(details))
}

/// Hand the equipment out (READY -> IN_USE)
#[utoipa::path(
    post,
    path = "/reservations/{id}/deliver",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation in use", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn deliver_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state
        .services
        .reservations
        .deliver(&claims.context(), id, claims.user_id)
        .await?;
    Ok(Json(details))
}

/// Take the equipment back (IN_USE -> CLEANING), charging any late penalty
#[utoipa::path(
    post,
    path = "/reservations/{id}/return",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Reservation in cleaning", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<ReservationDetails>> {
    let ctx = claims.context();
    let returned_at = request.actual_return_time.unwrap_or(ctx.now);
    let details = state
        .services
        .reservations
        .return_equipment(&ctx, id, claims.user_id, returned_at)
        .await?;
    Ok(Json(details))
}

/// Record the inspection outcome (CLEANING -> COMPLETED or MAINTENANCE)
#[utoipa::path(
    post,
    path = "/reservations/{id}/triage",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = TriageRequest,
    responses(
        (status = 200, description = "Inspection recorded", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn triage_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<TriageRequest>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state
        .services
        .reservations
        .triage(&claims.context(), id, request.outcome)
        .await?;
    Ok(Json(details))
}

/// Return repaired units to rotation (MAINTENANCE -> COMPLETED)
#[utoipa::path(
    post,
    path = "/reservations/{id}/resolve-maintenance",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Maintenance resolved", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn resolve_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state
        .services
        .reservations
        .resolve_maintenance(&claims.context(), id)
        .await?;
    Ok(Json(details))
}

/// Declare a no-show once the grace period has passed
#[utoipa::path(
    post,
    path = "/reservations/{id}/no-show",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Marked as no-show", body = ReservationDetails),
        (status = 422, description = "Grace period not over", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_no_show(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state.services.reservations.mark_no_show(&claims.context(), id).await?;
    Ok(Json(details))
}

/// Cancel a PENDING or READY reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<CancelRequest>,
) -> AppResult<Json<ReservationDetails>> {
    request.validate()?;

    let details = state
        .services
        .reservations
        .cancel(&claims.context(), id, request.reason)
        .await?;
    Ok(Json(details))
}

/// Move a reservation to a new start, keeping its duration
#[utoipa::path(
    post,
    path = "/reservations/{id}/reschedule",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Reservation moved", body = ReservationDetails),
        (status = 409, description = "Insufficient stock in the new window", body = crate::error::ErrorResponse),
        (status = 422, description = "Outside business hours", body = crate::error::ErrorResponse)
    )
)]
pub async fn reschedule_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RescheduleRequest>,
) -> AppResult<Json<ReservationDetails>> {
    request.validate()?;

    let details = state
        .services
        .reservations
        .reschedule(&claims.context(), id, request.new_start_time, &request.reason)
        .await?;
    Ok(Json(details))
}

/// Apply a percentage surcharge or discount
#[utoipa::path(
    post,
    path = "/reservations/{id}/adjustments",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = AdjustmentRequest,
    responses(
        (status = 200, description = "Adjustment applied", body = ReservationDetails),
        (status = 400, description = "Total would drop below amount paid", body = crate::error::ErrorResponse),
        (status = 403, description = "Admin or owner only", body = crate::error::ErrorResponse)
    )
)]
pub async fn apply_adjustment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AdjustmentRequest>,
) -> AppResult<Json<ReservationDetails>> {
    request.validate()?;

    let details = state
        .services
        .reservations
        .apply_manual_adjustment(&claims.context(), id, request.percentage, &request.reason)
        .await?;
    Ok(Json(details))
}

/// Pay the amount due upfront on a PENDING reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/payments/upfront",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Payment recorded", body = ReservationDetails),
        (status = 502, description = "Payment failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_upfront(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(payment): Json<PaymentDetails>,
) -> AppResult<Json<ReservationDetails>> {
    payment.validate()?;

    let details = state
        .services
        .reservations
        .register_upfront_payment(&claims.context(), id, &payment)
        .await?;
    Ok(Json(details))
}

/// Settle the remaining balance
#[utoipa::path(
    post,
    path = "/reservations/{id}/payments/balance",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Reservation fully paid", body = ReservationDetails),
        (status = 502, description = "Payment failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_balance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(payment): Json<PaymentDetails>,
) -> AppResult<Json<ReservationDetails>> {
    payment.validate()?;

    let details = state
        .services
        .reservations
        .register_balance_payment(&claims.context(), id, &payment)
        .await?;
    Ok(Json(details))
}

/// Move a completed reservation to the archive (COMPLETED -> RETURNED)
#[utoipa::path(
    post,
    path = "/reservations/{id}/archive",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation archived", body = ReservationDetails),
        (status = 409, description = "Invalid state transition", body = crate::error::ErrorResponse)
    )
)]
pub async fn archive_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let details = state.services.reservations.archive(&claims.context(), id).await?;
    Ok(Json(details))
}
