//! Quote pipeline: subtotal, promotions, tax, deposit, payment split

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use super::promotions;
use crate::{
    config::AppConfig,
    models::{PricedLine, Promotion, Quote},
};

/// Rates and display settings needed to price a cart
#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub tax_rate: Decimal,
    pub deposit_rate: Decimal,
    pub advance_ratio: Decimal,
    pub exchange_rate: Decimal,
    pub display_currency: String,
    pub utc_offset: FixedOffset,
}

impl QuoteSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tax_rate: config.pricing.tax_rate,
            deposit_rate: config.pricing.deposit_rate,
            advance_ratio: config.pricing.advance_ratio,
            exchange_rate: config.pricing.exchange_rate,
            display_currency: config.pricing.display_currency.clone(),
            utc_offset: utc_offset(config.business.utc_offset_minutes),
        }
    }
}

/// Falls back to UTC for offsets chrono rejects (beyond ±24h)
pub fn utc_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Two decimals, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A booking is "advance" when it starts on a later local calendar day than today
pub fn is_advance(start_time: DateTime<Utc>, now: DateTime<Utc>, offset: FixedOffset) -> bool {
    start_time.with_timezone(&offset).date_naive() != now.with_timezone(&offset).date_naive()
}

/// Prices a cart.
///
/// Pure: the same lines, promotions, coupon, times and settings always give
/// the same quote. Every component is rounded before the total is summed, so
/// `total == subtotal - discount_total + tax + deposit` holds exactly.
pub fn compute_quote(
    lines: &[PricedLine],
    promotions: &[Promotion],
    coupon: Option<&str>,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &QuoteSettings,
) -> Quote {
    let subtotal = round_money(lines.iter().map(|l| l.amount()).sum());

    let outcome = promotions::evaluate(promotions, lines, coupon);
    let discount_total = outcome.discount_sum().min(subtotal).max(Decimal::ZERO);

    let taxable = subtotal - discount_total;
    let tax = round_money(taxable * settings.tax_rate);
    let deposit = round_money(taxable * settings.deposit_rate);
    let total = subtotal - discount_total + tax + deposit;

    let advance = is_advance(start_time, now, settings.utc_offset);
    let amount_due_now = if advance {
        round_money(total * settings.advance_ratio)
    } else {
        total
    };

    let mut warnings = Vec::new();
    if let Some(code) = coupon.filter(|c| !c.is_empty()) {
        if !outcome.coupon_matched {
            warnings.push(format!("InvalidCoupon: {} is not a valid coupon", code));
        }
    }

    Quote {
        subtotal,
        discount_total,
        tax,
        deposit,
        total,
        is_advance: advance,
        amount_due_now,
        balance_at_delivery: total - amount_due_now,
        applied_promotions: outcome.applied,
        near_misses: outcome.near_misses,
        warnings,
        total_converted: round_money(total * settings.exchange_rate),
        display_currency: settings.display_currency.clone(),
    }
}
