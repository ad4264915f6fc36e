//! Operating-hours checks for a site

use chrono::{Datelike, Duration, FixedOffset, Timelike};

use super::availability::TimeWindow;
use crate::{
    error::{AppError, AppResult},
    models::Site,
};

/// Checks that `window` starts while the site is open and ends at least
/// `closing_buffer` before it closes on the same local day.
pub fn validate_booking_window(
    site: &Site,
    window: &TimeWindow,
    offset: FixedOffset,
    closing_buffer: Duration,
) -> AppResult<()> {
    let local_start = window.start.with_timezone(&offset);
    let local_end = window.end.with_timezone(&offset);
    let weekday = local_start.weekday().num_days_from_monday() as i16;

    let hours = site.hours_for(weekday).ok_or_else(|| {
        AppError::OutsideBusinessHours(format!(
            "Site {} is closed on {}",
            site.name,
            local_start.weekday()
        ))
    })?;

    let start_time = local_start.time();
    if start_time < hours.open_time || start_time >= hours.close_time {
        return Err(AppError::OutsideBusinessHours(format!(
            "Start {} is outside {}-{} at {}",
            start_time.format("%H:%M"),
            hours.open_time.format("%H:%M"),
            hours.close_time.format("%H:%M"),
            site.name
        )));
    }

    let latest_end = hours.close_time.num_seconds_from_midnight() as i64 - closing_buffer.num_seconds();
    let end_secs = local_end.time().num_seconds_from_midnight() as i64;
    if local_end.date_naive() != local_start.date_naive() || end_secs > latest_end {
        return Err(AppError::ExceedsClosingTime(format!(
            "Reservation must end at least {} minutes before {} closes at {}",
            closing_buffer.num_minutes(),
            site.name,
            hours.close_time.format("%H:%M")
        )));
    }

    Ok(())
}
