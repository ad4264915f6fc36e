//! Reservation, line item and adjustment models

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::{
    enums::{AdjustmentKind, PaymentMethod, ReservationStatus},
    quote::CartLine,
};
use crate::engine::availability::TimeWindow;

/// A booking of one or more line items for a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub customer_id: i32,
    /// Staff member who handed the equipment out
    pub seller_id: Option<i32>,
    pub site_id: i32,
    pub status: ReservationStatus,
    pub start_time: DateTime<Utc>,
    pub estimated_end_time: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub actual_return_time: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub discount: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    /// Refundable hold, included in `total`
    #[schema(value_type = String)]
    pub deposit: Decimal,
    /// Late-return penalties accumulated after creation
    #[schema(value_type = String)]
    pub penalty: Decimal,
    /// Net of manual adjustments and reschedule fees
    #[schema(value_type = String)]
    pub adjustments_total: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    /// Amount that must be paid before the reservation can be approved
    #[schema(value_type = String)]
    pub amount_due_now: Decimal,
    #[schema(value_type = String)]
    pub amount_paid: Decimal,
    #[schema(value_type = String)]
    pub balance_due: Decimal,
    pub is_advance: bool,
    pub coupon_code: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    /// Optimistic concurrency counter, bumped on every write
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.estimated_end_time)
    }

    /// Portion of the total that pays for the service itself (excludes the deposit)
    pub fn service_total(&self) -> Decimal {
        self.total - self.deposit
    }

    pub fn recompute_balance(&mut self) {
        self.balance_due = self.total - self.amount_paid;
    }
}

/// Reservation row from database
#[derive(Debug, Clone, FromRow)]
pub struct ReservationRow {
    pub id: i32,
    pub customer_id: i32,
    pub seller_id: Option<i32>,
    pub site_id: i32,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub estimated_end_time: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub actual_return_time: Option<DateTime<Utc>>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub deposit: Decimal,
    pub penalty: Decimal,
    pub adjustments_total: Decimal,
    pub total: Decimal,
    pub amount_due_now: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub is_advance: bool,
    pub coupon_code: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = String;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            customer_id: row.customer_id,
            seller_id: row.seller_id,
            site_id: row.site_id,
            // Legacy status labels are normalized here and nowhere else
            status: row.status.parse()?,
            start_time: row.start_time,
            estimated_end_time: row.estimated_end_time,
            delivered_at: row.delivered_at,
            actual_return_time: row.actual_return_time,
            subtotal: row.subtotal,
            discount: row.discount,
            tax: row.tax,
            deposit: row.deposit,
            penalty: row.penalty,
            adjustments_total: row.adjustments_total,
            total: row.total,
            amount_due_now: row.amount_due_now,
            amount_paid: row.amount_paid,
            balance_due: row.balance_due,
            is_advance: row.is_advance,
            coupon_code: row.coupon_code,
            payment_method: row.payment_method.map(|m| m.parse()).transpose()?,
            payment_reference: row.payment_reference,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A (resource, quantity, hours) entry within a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LineItem {
    pub id: i32,
    pub reservation_id: i32,
    pub resource_id: i32,
    pub quantity: i32,
    pub hours: i32,
    /// Hourly price captured at booking time
    #[schema(value_type = String)]
    pub unit_price: Decimal,
}

/// Ledger entry for every change to a reservation total after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Adjustment {
    pub id: i32,
    pub reservation_id: i32,
    pub kind: AdjustmentKind,
    /// Signed amount added to the total
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub reason: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

/// Adjustment row from database
#[derive(Debug, Clone, FromRow)]
pub struct AdjustmentRow {
    pub id: i32,
    pub reservation_id: i32,
    pub kind: String,
    pub amount: Decimal,
    pub reason: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdjustmentRow> for Adjustment {
    type Error = String;

    fn try_from(row: AdjustmentRow) -> Result<Self, Self::Error> {
        Ok(Adjustment {
            id: row.id,
            reservation_id: row.reservation_id,
            kind: row.kind.parse()?,
            amount: row.amount,
            reason: row.reason,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

/// Reservation with its line items and adjustment ledger
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationDetails {
    pub reservation: Reservation,
    pub line_items: Vec<LineItem>,
    pub adjustments: Vec<Adjustment>,
}

/// Line item to persist with a new reservation
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub resource_id: i32,
    pub quantity: i32,
    pub hours: i32,
    pub unit_price: Decimal,
}

impl NewLineItem {
    pub fn window(&self, start: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, start + Duration::hours(self.hours as i64))
    }
}

/// Fully priced reservation ready to be inserted in PENDING
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub customer_id: i32,
    pub site_id: i32,
    pub start_time: DateTime<Utc>,
    pub estimated_end_time: DateTime<Utc>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub deposit: Decimal,
    pub total: Decimal,
    pub amount_due_now: Decimal,
    pub is_advance: bool,
    pub coupon_code: Option<String>,
    pub line_items: Vec<NewLineItem>,
}

/// Adjustment to append together with a reservation update
#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub kind: AdjustmentKind,
    pub amount: Decimal,
    pub reason: String,
    pub created_by: i32,
}

/// One atomic write produced by a lifecycle operation.
///
/// The store applies every part or none: the reservation row (guarded by
/// `expected_version`), optional ledger entry, repair-unit moves, and when
/// `recheck_stock` is set, an availability re-check of the new window.
#[derive(Debug, Clone)]
pub struct ReservationUpdate {
    pub reservation: Reservation,
    pub expected_version: i32,
    pub adjustment: Option<NewAdjustment>,
    /// (resource_id, delta) applied to `units_in_repair`
    pub repair_moves: Vec<(i32, i32)>,
    pub recheck_stock: bool,
}

impl ReservationUpdate {
    pub fn new(reservation: Reservation, expected_version: i32) -> Self {
        Self {
            reservation,
            expected_version,
            adjustment: None,
            repair_moves: Vec::new(),
            recheck_stock: false,
        }
    }
}

// ---- Requests ----

/// Reservation creation request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, message = "Cart must not be empty"), nested)]
    pub lines: Vec<CartLine>,
    pub start_time: DateTime<Utc>,
    pub coupon_code: Option<String>,
    /// Staff may book on behalf of a customer; defaults to the caller
    pub customer_id: Option<i32>,
    /// Client's belief about advance booking; logged, never trusted
    pub is_advance_hint: Option<bool>,
}

/// Payment method and processor reference
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 128, message = "Payment reference is required"))]
    pub reference: String,
}

/// Create a reservation and capture its upfront payment
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookReservationRequest {
    #[validate(nested)]
    pub reservation: CreateReservationRequest,
    #[validate(nested)]
    pub payment: PaymentDetails,
}
