//! Reservation state machine
//!
//! Every lifecycle command is planned here as a pure function of the current
//! reservation, the request context and the policy. The result is a
//! [`ReservationUpdate`] that the store applies atomically; nothing in this
//! module touches storage or the clock.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::Decimal;

use super::{
    availability::TimeWindow,
    hours,
    penalty::{self, PenaltyPolicy},
    quote::{round_money, utc_offset},
};
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        enums::{AdjustmentKind, PaymentMethod, RescheduleReason, ReservationStatus, Role, TriageOutcome},
        reservation::{NewAdjustment, ReservationUpdate},
        RequestContext, ReservationDetails, Site,
    },
};

use ReservationStatus::*;

/// Everything the state machine needs from configuration
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub penalty: PenaltyPolicy,
    /// No-show may be declared once this long has passed after the start
    pub no_show_grace: Duration,
    /// Approval opens this long before the start
    pub approval_window: Duration,
    pub closing_buffer: Duration,
    pub utc_offset: FixedOffset,
}

impl LifecyclePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let pricing = &config.pricing;
        Self {
            penalty: PenaltyPolicy {
                grace: Duration::minutes(pricing.grace_minutes),
                late_multiplier: pricing.late_multiplier,
                reschedule_fee: pricing.reschedule_fee,
            },
            no_show_grace: Duration::minutes(pricing.grace_minutes),
            approval_window: Duration::minutes(pricing.approval_window_minutes),
            closing_buffer: Duration::minutes(pricing.closing_buffer_minutes),
            utc_offset: utc_offset(config.business.utc_offset_minutes),
        }
    }
}

/// Operations subject to role gating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    View,
    ApproveForDelivery,
    Deliver,
    ReturnEquipment,
    Triage,
    ResolveMaintenance,
    MarkNoShow,
    Cancel,
    Reschedule,
    ApplyManualAdjustment,
    RegisterUpfrontPayment,
    RegisterBalancePayment,
    Archive,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::View => "view",
            Operation::ApproveForDelivery => "approve for delivery",
            Operation::Deliver => "deliver",
            Operation::ReturnEquipment => "return equipment",
            Operation::Triage => "triage",
            Operation::ResolveMaintenance => "resolve maintenance",
            Operation::MarkNoShow => "mark as no-show",
            Operation::Cancel => "cancel",
            Operation::Reschedule => "reschedule",
            Operation::ApplyManualAdjustment => "apply manual adjustment",
            Operation::RegisterUpfrontPayment => "register upfront payment",
            Operation::RegisterBalancePayment => "register balance payment",
            Operation::Archive => "archive",
        }
    }

    /// Roles allowed besides admin and owner
    fn roles(&self) -> &'static [Role] {
        match self {
            Operation::Create | Operation::Reschedule => &[Role::Customer],
            Operation::View => &[Role::Customer, Role::Mechanic, Role::Seller],
            Operation::ApproveForDelivery | Operation::Triage | Operation::ResolveMaintenance => &[Role::Mechanic],
            Operation::Deliver | Operation::ReturnEquipment | Operation::MarkNoShow => &[Role::Seller],
            Operation::Cancel | Operation::RegisterUpfrontPayment | Operation::RegisterBalancePayment => {
                &[Role::Customer, Role::Seller]
            }
            Operation::ApplyManualAdjustment | Operation::Archive => &[],
        }
    }

    /// Statuses from which the operation may run
    pub fn sources(&self) -> &'static [ReservationStatus] {
        match self {
            Operation::Create | Operation::View => &[],
            Operation::ApproveForDelivery => &[Pending],
            Operation::Deliver => &[Ready],
            Operation::ReturnEquipment => &[InUse],
            Operation::Triage => &[Cleaning],
            Operation::ResolveMaintenance => &[Maintenance],
            Operation::MarkNoShow | Operation::Cancel => &[Pending, Ready],
            Operation::Reschedule => &[Pending, Ready, InUse],
            Operation::ApplyManualAdjustment => &[Pending, Ready, InUse, Cleaning, Maintenance, Completed],
            Operation::RegisterUpfrontPayment => &[Pending],
            Operation::RegisterBalancePayment => &[Ready, InUse, Cleaning, Maintenance, Completed],
            Operation::Archive => &[Completed],
        }
    }
}

/// Role gate. Customers may only act on their own reservations.
pub fn authorize(operation: Operation, ctx: &RequestContext, owner_id: i32) -> AppResult<()> {
    if ctx.role.is_admin() {
        return Ok(());
    }
    if !operation.roles().contains(&ctx.role) {
        return Err(AppError::Forbidden(format!(
            "Role {} may not {}",
            ctx.role,
            operation.as_str()
        )));
    }
    if ctx.role == Role::Customer && owner_id != ctx.actor_id {
        return Err(AppError::Forbidden(format!(
            "Customers may only {} their own reservations",
            operation.as_str()
        )));
    }
    Ok(())
}

/// Fails with `InvalidStateTransition` unless `from` is a valid source
pub fn ensure_source(operation: Operation, from: ReservationStatus) -> AppResult<()> {
    if operation.sources().contains(&from) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition {
            operation: operation.as_str().to_string(),
            from: from.to_string(),
        })
    }
}

/// A lifecycle command with its arguments
#[derive(Debug, Clone)]
pub enum Command {
    ApproveForDelivery,
    Deliver {
        staff_id: i32,
    },
    ReturnEquipment {
        staff_id: i32,
        actual_return_time: DateTime<Utc>,
    },
    Triage(TriageOutcome),
    ResolveMaintenance,
    MarkNoShow,
    Cancel {
        reason: Option<String>,
    },
    Reschedule {
        new_start_time: DateTime<Utc>,
        reason: RescheduleReason,
    },
    ApplyManualAdjustment {
        percentage: Decimal,
        reason: String,
    },
    RegisterUpfrontPayment {
        method: PaymentMethod,
        reference: String,
        amount: Decimal,
    },
    /// `amount` is what was actually captured for the balance
    RegisterBalancePayment {
        method: PaymentMethod,
        reference: String,
        amount: Decimal,
    },
    Archive,
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::ApproveForDelivery => Operation::ApproveForDelivery,
            Command::Deliver { .. } => Operation::Deliver,
            Command::ReturnEquipment { .. } => Operation::ReturnEquipment,
            Command::Triage(_) => Operation::Triage,
            Command::ResolveMaintenance => Operation::ResolveMaintenance,
            Command::MarkNoShow => Operation::MarkNoShow,
            Command::Cancel { .. } => Operation::Cancel,
            Command::Reschedule { .. } => Operation::Reschedule,
            Command::ApplyManualAdjustment { .. } => Operation::ApplyManualAdjustment,
            Command::RegisterUpfrontPayment { .. } => Operation::RegisterUpfrontPayment,
            Command::RegisterBalancePayment { .. } => Operation::RegisterBalancePayment,
            Command::Archive => Operation::Archive,
        }
    }
}

/// Plans `command` against the current state of a reservation.
///
/// `site` is only consulted by reschedules, which re-validate opening hours.
pub fn plan(
    command: &Command,
    details: &ReservationDetails,
    ctx: &RequestContext,
    policy: &LifecyclePolicy,
    site: Option<&Site>,
) -> AppResult<ReservationUpdate> {
    let current = &details.reservation;
    let operation = command.operation();
    authorize(operation, ctx, current.customer_id)?;
    ensure_source(operation, current.status)?;

    let mut next = current.clone();
    let mut adjustment = None;
    let mut repair_moves = Vec::new();
    let mut recheck_stock = false;

    match command {
        Command::ApproveForDelivery => {
            if current.amount_paid < current.amount_due_now {
                return Err(AppError::PaymentRequired(format!(
                    "{} of {} due upfront has been paid",
                    current.amount_paid, current.amount_due_now
                )));
            }
            let opens_at = current.start_time - policy.approval_window;
            if ctx.now < opens_at {
                return Err(AppError::TooEarly(format!(
                    "Approval opens at {}",
                    opens_at.to_rfc3339()
                )));
            }
            next.status = Ready;
        }
        Command::Deliver { staff_id } => {
            next.status = InUse;
            next.seller_id = Some(*staff_id);
            next.delivered_at = Some(ctx.now);
        }
        Command::ReturnEquipment {
            staff_id,
            actual_return_time,
        } => {
            if *actual_return_time < current.start_time {
                return Err(AppError::Validation(
                    "Return time cannot precede the reservation start".to_string(),
                ));
            }
            let late_fee = penalty::late_return_penalty(
                &details.line_items,
                current.estimated_end_time,
                *actual_return_time,
                &policy.penalty,
            );
            next.status = Cleaning;
            next.actual_return_time = Some(*actual_return_time);
            if late_fee > Decimal::ZERO {
                let minutes_late = (*actual_return_time - current.estimated_end_time).num_minutes();
                next.penalty += late_fee;
                next.total += late_fee;
                adjustment = Some(NewAdjustment {
                    kind: AdjustmentKind::LatePenalty,
                    amount: late_fee,
                    reason: format!("Returned {} minutes late", minutes_late),
                    created_by: *staff_id,
                });
            }
        }
        Command::Triage(outcome) => match outcome {
            TriageOutcome::Ok => next.status = Completed,
            TriageOutcome::Faulty => {
                next.status = Maintenance;
                repair_moves = details
                    .line_items
                    .iter()
                    .map(|item| (item.resource_id, item.quantity))
                    .collect();
            }
        },
        Command::ResolveMaintenance => {
            next.status = Completed;
            repair_moves = details
                .line_items
                .iter()
                .map(|item| (item.resource_id, -item.quantity))
                .collect();
        }
        Command::MarkNoShow => {
            let allowed_from = current.start_time + policy.no_show_grace;
            if ctx.now <= allowed_from || current.delivered_at.is_some() {
                return Err(AppError::TooEarly(format!(
                    "No-show can be declared after {}",
                    allowed_from.to_rfc3339()
                )));
            }
            next.status = NoShow;
        }
        Command::Cancel { .. } => {
            next.status = Cancelled;
        }
        Command::Reschedule {
            new_start_time,
            reason,
        } => {
            if current.status != InUse && *new_start_time < ctx.now {
                return Err(AppError::Validation("Cannot reschedule into the past".to_string()));
            }
            let window = TimeWindow::new(current.start_time, current.estimated_end_time)
                .shifted_to(*new_start_time);
            let site = site.ok_or_else(|| {
                AppError::Internal(format!("Site {} not loaded for reschedule", current.site_id))
            })?;
            hours::validate_booking_window(site, &window, policy.utc_offset, policy.closing_buffer)?;

            next.start_time = window.start;
            next.estimated_end_time = window.end;
            recheck_stock = true;

            let fee = penalty::reschedule_fee(reason, &policy.penalty);
            if fee > Decimal::ZERO {
                next.adjustments_total += fee;
                next.total += fee;
                adjustment = Some(NewAdjustment {
                    kind: AdjustmentKind::RescheduleFee,
                    amount: fee,
                    reason: format!("Rescheduled: {}", reason.as_str()),
                    created_by: ctx.actor_id,
                });
            }
        }
        Command::ApplyManualAdjustment { percentage, reason } => {
            if reason.trim().is_empty() {
                return Err(AppError::Validation("Adjustment reason is required".to_string()));
            }
            let amount = round_money(current.service_total() * *percentage / Decimal::ONE_HUNDRED);
            if current.total + amount < current.amount_paid {
                return Err(AppError::Validation(format!(
                    "Adjustment of {} would leave the total below the {} already paid",
                    amount, current.amount_paid
                )));
            }
            next.adjustments_total += amount;
            next.total += amount;
            adjustment = Some(NewAdjustment {
                kind: AdjustmentKind::Manual,
                amount,
                reason: reason.clone(),
                created_by: ctx.actor_id,
            });
        }
        Command::RegisterUpfrontPayment {
            method,
            reference,
            amount,
        } => {
            if *amount <= Decimal::ZERO {
                return Err(AppError::Validation("Payment amount must be positive".to_string()));
            }
            if current.amount_paid + *amount > current.total {
                return Err(AppError::Validation(format!(
                    "Payment of {} exceeds the outstanding {}",
                    amount, current.balance_due
                )));
            }
            next.amount_paid += *amount;
            next.payment_method = Some(*method);
            next.payment_reference = Some(reference.clone());
        }
        Command::RegisterBalancePayment {
            method,
            reference,
            amount,
        } => {
            // The total may have moved since the amount was captured
            if *amount != current.balance_due {
                return Err(AppError::PaymentRequired(format!(
                    "Balance is now {} but {} was captured",
                    current.balance_due, amount
                )));
            }
            next.amount_paid += *amount;
            next.payment_method = Some(*method);
            next.payment_reference = Some(reference.clone());
        }
        Command::Archive => {
            next.status = Returned;
        }
    }

    next.recompute_balance();

    let mut update = ReservationUpdate::new(next, current.version);
    update.adjustment = adjustment;
    update.repair_moves = repair_moves;
    update.recheck_stock = recheck_stock;
    Ok(update)
}
