//! Site and operating hours models

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A physical pickup location
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Site {
    pub id: i32,
    pub name: String,
    /// Opening hours; a weekday without an entry is closed
    pub hours: Vec<SiteHours>,
}

/// Site row from database
#[derive(Debug, Clone, FromRow)]
pub struct SiteRow {
    pub id: i32,
    pub name: String,
}

/// Opening hours for one weekday
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SiteHours {
    pub site_id: i32,
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl Site {
    pub fn hours_for(&self, day_of_week: i16) -> Option<&SiteHours> {
        self.hours.iter().find(|h| h.day_of_week == day_of_week)
    }
}
