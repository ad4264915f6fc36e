//! Promotion rule evaluation

use rust_decimal::Decimal;

use super::quote::round_money;
use crate::models::{
    enums::{BenefitKind, PromotionKind},
    quote::AppliedPromotion,
    PricedLine, Promotion,
};

/// What the promotion rules produced for one cart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionOutcome {
    pub applied: Vec<AppliedPromotion>,
    pub near_misses: Vec<String>,
    /// A coupon was given and at least one active promotion carries it
    pub coupon_matched: bool,
}

impl PromotionOutcome {
    pub fn discount_sum(&self) -> Decimal {
        self.applied.iter().map(|a| a.amount).sum()
    }
}

/// Lines a promotion looks at: its resource if set, else its category, else the whole cart
pub fn eligible_lines<'a>(promotion: &Promotion, lines: &'a [PricedLine]) -> Vec<&'a PricedLine> {
    match (promotion.resource_id, promotion.category_id) {
        (Some(resource_id), _) => lines.iter().filter(|l| l.resource_id == resource_id).collect(),
        (None, Some(category_id)) => lines.iter().filter(|l| l.category_id == category_id).collect(),
        (None, None) => lines.iter().collect(),
    }
}

/// How far the scope is from meeting the condition; `0` means met
fn shortfall(promotion: &Promotion, scope: &[&PricedLine]) -> i32 {
    // Widened so large carts cannot wrap past the threshold
    let reached: i64 = match promotion.kind {
        PromotionKind::TimeRule => scope.iter().map(|l| i64::from(l.hours)).max().unwrap_or(0),
        PromotionKind::QuantityRule => scope.iter().map(|l| i64::from(l.quantity)).sum(),
    };
    let missing = (i64::from(promotion.threshold) - reached).max(0);
    i32::try_from(missing).unwrap_or(i32::MAX)
}

pub fn condition_met(promotion: &Promotion, scope: &[&PricedLine]) -> bool {
    !scope.is_empty() && shortfall(promotion, scope) == 0
}

pub fn benefit_amount(promotion: &Promotion, scope: &[&PricedLine]) -> Decimal {
    match promotion.benefit {
        BenefitKind::Percentage => {
            let scope_subtotal: Decimal = scope.iter().map(|l| l.amount()).sum();
            round_money(scope_subtotal * promotion.value / Decimal::ONE_HUNDRED)
        }
        BenefitKind::Fixed => round_money(promotion.value),
    }
}

fn benefit_label(promotion: &Promotion) -> String {
    match promotion.benefit {
        BenefitKind::Percentage => format!("{}% off", promotion.value.normalize()),
        BenefitKind::Fixed => format!("{} off", round_money(promotion.value)),
    }
}

fn near_miss_message(promotion: &Promotion, missing: i32) -> String {
    let unit = match (promotion.kind, missing) {
        (PromotionKind::TimeRule, 1) => "hour",
        (PromotionKind::TimeRule, _) => "hours",
        (PromotionKind::QuantityRule, 1) => "unit",
        (PromotionKind::QuantityRule, _) => "units",
    };
    format!(
        "{} more {} for {} ({})",
        missing,
        unit,
        benefit_label(promotion),
        promotion.name
    )
}

fn coupon_matches(promotion: &Promotion, coupon: Option<&str>) -> bool {
    match (promotion.coupon_code.as_deref(), coupon) {
        (Some(code), Some(given)) => code == given,
        _ => false,
    }
}

/// Evaluates every active promotion against the cart.
///
/// Qualifying promotions stack; the caller caps the sum at the subtotal.
/// Promotions are visited in id order so the outcome is deterministic.
pub fn evaluate(promotions: &[Promotion], lines: &[PricedLine], coupon: Option<&str>) -> PromotionOutcome {
    let mut ordered: Vec<&Promotion> = promotions.iter().filter(|p| p.active).collect();
    ordered.sort_by_key(|p| p.id);

    let mut outcome = PromotionOutcome::default();

    for promotion in ordered {
        let unlocked = if promotion.automatic {
            true
        } else {
            let matched = coupon_matches(promotion, coupon);
            outcome.coupon_matched |= matched;
            matched
        };
        if !unlocked {
            continue;
        }

        let scope = eligible_lines(promotion, lines);
        if scope.is_empty() {
            continue;
        }

        if condition_met(promotion, &scope) {
            outcome.applied.push(AppliedPromotion {
                promotion_id: promotion.id,
                name: promotion.name.clone(),
                amount: benefit_amount(promotion, &scope),
            });
        } else {
            outcome
                .near_misses
                .push(near_miss_message(promotion, shortfall(promotion, &scope)));
        }
    }

    outcome
}
