//! Cart and quote models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Upper bound on units per cart line
pub const MAX_LINE_QUANTITY: i32 = 1_000;
/// Upper bound on hours per cart line; a booking never spans local midnight
pub const MAX_LINE_HOURS: i32 = 24;

/// One requested line of a cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    pub resource_id: i32,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
    #[validate(range(min = 1, max = 24, message = "Hours must be between 1 and 24"))]
    pub hours: i32,
}

/// Cart line resolved against the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub resource_id: i32,
    pub category_id: i32,
    pub quantity: i32,
    pub hours: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn amount(&self) -> Decimal {
        self.unit_price * Decimal::from(self.hours) * Decimal::from(self.quantity)
    }
}

/// Promotion applied to a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppliedPromotion {
    pub promotion_id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

/// Price breakdown for a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub discount_total: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub deposit: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub is_advance: bool,
    #[schema(value_type = String)]
    pub amount_due_now: Decimal,
    /// Remainder collected at delivery for advance bookings
    #[schema(value_type = String)]
    pub balance_at_delivery: Decimal,
    pub applied_promotions: Vec<AppliedPromotion>,
    /// Hints such as "2 more hours for 10% off"
    pub near_misses: Vec<String>,
    /// Soft, non-fatal issues (e.g. an unknown coupon)
    pub warnings: Vec<String>,
    /// Display-only conversion of `total`
    #[schema(value_type = String)]
    pub total_converted: Decimal,
    pub display_currency: String,
}

/// Quote preview request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    #[validate(length(min = 1, message = "Cart must not be empty"), nested)]
    pub lines: Vec<CartLine>,
    pub start_time: DateTime<Utc>,
    pub coupon_code: Option<String>,
}
