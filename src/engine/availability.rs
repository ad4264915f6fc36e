//! Time-window overlap and stock accounting

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::{AppError, AppResult},
    models::{enums::ReservationStatus, Resource},
};

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn from_hours(start: DateTime<Utc>, hours: i32) -> Self {
        Self::new(start, start + Duration::hours(hours as i64))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Same duration, new start
    pub fn shifted_to(&self, start: DateTime<Utc>) -> Self {
        Self::new(start, start + self.duration())
    }

    /// Smallest window covering both
    pub fn union(&self, other: &TimeWindow) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Touching endpoints do not overlap.
pub fn overlaps(s1: DateTime<Utc>, e1: DateTime<Utc>, s2: DateTime<Utc>, e2: DateTime<Utc>) -> bool {
    s1 < e2 && s2 < e1
}

/// Units of a resource tied to one reservation over that reservation's window
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub reservation_id: i32,
    pub resource_id: i32,
    pub quantity: i32,
    pub status: ReservationStatus,
    pub window: TimeWindow,
}

/// Total quantity of one resource required over one window
#[derive(Debug, Clone, PartialEq)]
pub struct StockDemand {
    pub resource_id: i32,
    pub quantity: i32,
    pub window: TimeWindow,
}

/// Free units of `resource` over `window`.
///
/// Only holdings in a stock-holding status that overlap the window count;
/// `exclude` drops one reservation (used when it is being moved). Never
/// negative.
pub fn available_units(
    resource: &Resource,
    holdings: &[Holding],
    window: &TimeWindow,
    exclude: Option<i32>,
) -> AppResult<i32> {
    if !resource.active {
        return Err(AppError::ResourceNotFound(format!(
            "Resource {} is not available for rental",
            resource.id
        )));
    }

    let booked: i32 = holdings
        .iter()
        .filter(|h| h.resource_id == resource.id)
        .filter(|h| Some(h.reservation_id) != exclude)
        .filter(|h| h.status.holds_stock())
        .filter(|h| h.window.overlaps(window))
        .fold(0i32, |acc, h| acc.saturating_add(h.quantity));

    Ok((resource.rentable_units() - booked).max(0))
}

/// Fails with `InsufficientStock` when the demand cannot be met
pub fn verify_stock(
    resource: &Resource,
    holdings: &[Holding],
    demand: &StockDemand,
    exclude: Option<i32>,
) -> AppResult<()> {
    let available = available_units(resource, holdings, &demand.window, exclude)?;
    if available < demand.quantity {
        return Err(AppError::InsufficientStock {
            resource_id: resource.id,
            requested: demand.quantity,
            available,
        });
    }
    Ok(())
}

/// Groups `(resource_id, quantity, window)` entries per resource.
///
/// Quantities add up and the window widens to cover every entry, so a cart
/// naming one resource twice is checked against the pool once. Output is
/// ordered by resource id, which is also the lock order.
pub fn aggregate_demand<I>(entries: I) -> Vec<StockDemand>
where
    I: IntoIterator<Item = (i32, i32, TimeWindow)>,
{
    let mut by_resource: BTreeMap<i32, StockDemand> = BTreeMap::new();
    for (resource_id, quantity, window) in entries {
        by_resource
            .entry(resource_id)
            .and_modify(|d| {
                // Saturates: an absurd total simply exceeds any stock
                d.quantity = d.quantity.saturating_add(quantity);
                d.window = d.window.union(&window);
            })
            .or_insert(StockDemand {
                resource_id,
                quantity,
                window,
            });
    }
    by_resource.into_values().collect()
}
