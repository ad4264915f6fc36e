//! Quote preview endpoint

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{quote::QuoteRequest, Quote},
};

use super::AuthenticatedUser;

/// Price a cart without reserving anything
#[utoipa::path(
    post,
    path = "/quotes",
    tag = "quotes",
    security(("bearer_auth" = [])),
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Price breakdown; unknown coupons appear as warnings", body = Quote),
        (status = 400, description = "Invalid cart", body = crate::error::ErrorResponse),
        (status = 404, description = "Resource missing or inactive", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_quote(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<QuoteRequest>,
) -> AppResult<Json<Quote>> {
    request.validate()?;

    let quote = state.services.catalog.quote(&request, &claims.context()).await?;
    Ok(Json(quote))
}
