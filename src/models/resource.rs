//! Rentable resource (catalog) model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A rentable item type with a finite number of physical units at one site
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Resource {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub site_id: i32,
    /// Price per hour per unit
    #[schema(value_type = String)]
    pub price_per_hour: Decimal,
    /// Physical units owned
    pub total_units: i32,
    /// Units pulled out of rotation after a faulty inspection
    pub units_in_repair: i32,
    pub active: bool,
}

impl Resource {
    /// Units that exist and are fit for rental, ignoring bookings
    pub fn rentable_units(&self) -> i32 {
        (self.total_units - self.units_in_repair).max(0)
    }
}

/// Advisory availability for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityView {
    pub resource_id: i32,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub available_units: i32,
}
