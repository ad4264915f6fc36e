//! Late-return penalty and reschedule fee

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::quote::round_money;
use crate::models::{LineItem, RescheduleReason};

/// Late-return and reschedule policy
#[derive(Debug, Clone)]
pub struct PenaltyPolicy {
    pub grace: Duration,
    pub late_multiplier: Decimal,
    pub reschedule_fee: Decimal,
}

/// Hours late, rounded up; zero while within the grace period
pub fn late_hours(estimated_end: DateTime<Utc>, actual_return: DateTime<Utc>, grace: Duration) -> i64 {
    let late = actual_return - estimated_end;
    if late <= Duration::zero() || late <= grace {
        return 0;
    }
    let seconds = late.num_seconds();
    (seconds + 3599) / 3600
}

/// Σ ⌈late hours⌉ × hourly price × multiplier × quantity over all line items
pub fn late_return_penalty(
    line_items: &[LineItem],
    estimated_end: DateTime<Utc>,
    actual_return: DateTime<Utc>,
    policy: &PenaltyPolicy,
) -> Decimal {
    let hours = late_hours(estimated_end, actual_return, policy.grace);
    if hours == 0 {
        return Decimal::ZERO;
    }
    let per_hour: Decimal = line_items
        .iter()
        .map(|item| item.unit_price * policy.late_multiplier * Decimal::from(item.quantity))
        .sum();
    round_money(per_hour * Decimal::from(hours))
}

pub fn reschedule_fee(reason: &RescheduleReason, policy: &PenaltyPolicy) -> Decimal {
    if reason.is_no_fault() {
        Decimal::ZERO
    } else {
        policy.reschedule_fee
    }
}
