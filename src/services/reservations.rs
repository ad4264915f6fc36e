//! Reservation booking and lifecycle service
//!
//! Loads state from the store, lets the engine plan the change, and commits
//! it atomically. Conflicting writes are retried up to
//! `concurrency.max_attempts` times before the conflict is surfaced.

use std::{collections::BTreeSet, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{
    catalog::price_lines,
    notifier::{ChangeEvent, ChangeNotifier},
    payments::{PaymentGateway, PaymentReceipt},
};
use crate::{
    config::AppConfig,
    engine::{
        hours,
        lifecycle::{self, Command, LifecyclePolicy, Operation},
        quote::{self, QuoteSettings},
        TimeWindow,
    },
    error::{AppError, AppResult},
    models::{
        reservation::NewLineItem, reservation::NewReservation, CreateReservationRequest, PaymentDetails,
        PricedLine, RequestContext, RescheduleReason, Reservation, ReservationDetails, ReservationStatus,
        Resource, Role, TriageOutcome,
    },
    repository::ReservationStore,
};

/// All lines of a reservation must be picked up at one site
fn single_site(lines: &[PricedLine], resources: &[Resource]) -> AppResult<i32> {
    let sites: BTreeSet<i32> = lines
        .iter()
        .filter_map(|line| resources.iter().find(|r| r.id == line.resource_id))
        .map(|r| r.site_id)
        .collect();

    let mut iter = sites.into_iter();
    match (iter.next(), iter.next()) {
        (Some(site_id), None) => Ok(site_id),
        (None, _) => Err(AppError::Validation("Cart must not be empty".to_string())),
        (Some(_), Some(_)) => Err(AppError::Validation(
            "All reserved resources must belong to the same site".to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    payments: Arc<dyn PaymentGateway>,
    notifier: ChangeNotifier,
    quote_settings: QuoteSettings,
    policy: LifecyclePolicy,
    max_attempts: u32,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        payments: Arc<dyn PaymentGateway>,
        notifier: ChangeNotifier,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            quote_settings: QuoteSettings::from_config(config),
            policy: LifecyclePolicy::from_config(config),
            max_attempts: config.concurrency.max_attempts.max(1),
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, ctx: &RequestContext, mut attempt_once: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        operation,
                        attempt,
                        "Concurrency conflict, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn notify(&self, operation: Operation, details: &ReservationDetails, ctx: &RequestContext) {
        self.notifier
            .publish(ChangeEvent::from_details(operation.as_str(), details, ctx.now))
            .await;
    }

    // ---- Queries ----

    /// Get a reservation; customers only see their own
    pub async fn get(&self, ctx: &RequestContext, id: i32) -> AppResult<ReservationDetails> {
        let details = self.store.get_reservation(id).await?;
        lifecycle::authorize(Operation::View, ctx, details.reservation.customer_id)?;
        Ok(details)
    }

    /// List reservations; customers are restricted to their own
    pub async fn list(
        &self,
        ctx: &RequestContext,
        customer_id: Option<i32>,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        let customer_id = if ctx.role == Role::Customer {
            if customer_id.is_some_and(|id| id != ctx.actor_id) {
                return Err(AppError::Forbidden(
                    "Customers may only list their own reservations".to_string(),
                ));
            }
            Some(ctx.actor_id)
        } else {
            customer_id
        };
        self.store.list_reservations(customer_id, status).await
    }

    // ---- Creation ----

    /// Validate, price, and insert a PENDING reservation with an atomic stock check
    pub async fn create(&self, ctx: &RequestContext, request: &CreateReservationRequest) -> AppResult<ReservationDetails> {
        let customer_id = request.customer_id.unwrap_or(ctx.actor_id);
        lifecycle::authorize(Operation::Create, ctx, customer_id)?;

        if request.start_time < ctx.now {
            return Err(AppError::Validation("Start time is in the past".to_string()));
        }

        // Prices come from the store, not the cache: they are captured on the line items
        let resources = self.store.list_resources().await?;
        let lines = price_lines(&request.lines, &resources)?;
        let site_id = single_site(&lines, &resources)?;
        let site = self.store.get_site(site_id).await?;

        let max_hours = lines.iter().map(|l| l.hours).max().unwrap_or(0);
        let window = TimeWindow::from_hours(request.start_time, max_hours);
        hours::validate_booking_window(&site, &window, self.policy.utc_offset, self.policy.closing_buffer)?;

        let promotions = self.store.active_promotions().await?;
        let quote = quote::compute_quote(
            &lines,
            &promotions,
            request.coupon_code.as_deref(),
            request.start_time,
            ctx.now,
            &self.quote_settings,
        );

        if let Some(hint) = request.is_advance_hint.filter(|hint| *hint != quote.is_advance) {
            tracing::debug!(
                request_id = %ctx.request_id,
                hint,
                derived = quote.is_advance,
                "Client advance hint disagrees with derived value"
            );
        }
        for warning in &quote.warnings {
            tracing::info!(request_id = %ctx.request_id, "{}", warning);
        }
        let coupon_valid = !quote.warnings.iter().any(|w| w.starts_with("InvalidCoupon"));

        let draft = NewReservation {
            customer_id,
            site_id,
            start_time: window.start,
            estimated_end_time: window.end,
            subtotal: quote.subtotal,
            discount: quote.discount_total,
            tax: quote.tax,
            deposit: quote.deposit,
            total: quote.total,
            amount_due_now: quote.amount_due_now,
            is_advance: quote.is_advance,
            coupon_code: request.coupon_code.clone().filter(|_| coupon_valid),
            line_items: lines
                .iter()
                .map(|l| NewLineItem {
                    resource_id: l.resource_id,
                    quantity: l.quantity,
                    hours: l.hours,
                    unit_price: l.unit_price,
                })
                .collect(),
        };

        let details = self
            .with_retry("create", ctx, || self.store.insert_reservation(&draft, ctx.now))
            .await?;

        tracing::info!(
            request_id = %ctx.request_id,
            reservation_id = details.reservation.id,
            customer_id,
            total = %details.reservation.total,
            "Reservation created"
        );
        self.notify(Operation::Create, &details, ctx).await;
        Ok(details)
    }

    /// Create, then capture the upfront amount outside any lock.
    ///
    /// When the capture fails the reservation is cancelled again and
    /// `PaymentFailed` is returned. When the capture succeeds but cannot be
    /// recorded, the money is refunded and the reservation cancelled too.
    pub async fn book(
        &self,
        ctx: &RequestContext,
        request: &CreateReservationRequest,
        payment: &PaymentDetails,
    ) -> AppResult<ReservationDetails> {
        let created = self.create(ctx, request).await?;
        let id = created.reservation.id;
        let amount = created.reservation.amount_due_now;
        if amount <= Decimal::ZERO {
            return Ok(created);
        }

        match self.payments.capture(&payment.reference, payment.method, amount).await {
            Ok(receipt) => match self.record_upfront(ctx, id, receipt.clone()).await {
                Ok(details) => Ok(details),
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        reservation_id = id,
                        "Recording upfront payment failed, refunding and cancelling: {}",
                        e
                    );
                    self.reverse(ctx, id, &receipt).await;
                    self.compensate(ctx, id).await;
                    Err(e)
                }
            },
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    reservation_id = id,
                    "Upfront payment failed, cancelling reservation: {}",
                    e
                );
                self.compensate(ctx, id).await;
                Err(match e {
                    AppError::PaymentFailed(msg) => AppError::PaymentFailed(msg),
                    other => AppError::PaymentFailed(other.to_string()),
                })
            }
        }
    }

    /// Hand back a capture that could not be recorded
    async fn reverse(&self, ctx: &RequestContext, id: i32, receipt: &PaymentReceipt) {
        if let Err(e) = self.payments.refund(receipt).await {
            // Money is held with nothing recorded against it; needs manual reconciliation
            tracing::error!(
                request_id = %ctx.request_id,
                reservation_id = id,
                reference = %receipt.reference,
                amount = %receipt.amount,
                "Refund failed: {}",
                e
            );
        }
    }

    async fn compensate(&self, ctx: &RequestContext, id: i32) {
        // The customer may lack rights to undo on their own; compensation acts as the system
        let system = RequestContext {
            role: Role::Owner,
            ..ctx.clone()
        };
        let command = Command::Cancel {
            reason: Some("Upfront payment failed".to_string()),
        };
        if let Err(e) = self.execute(&system, id, command).await {
            tracing::error!(
                request_id = %ctx.request_id,
                reservation_id = id,
                "Compensating cancellation failed: {}",
                e
            );
        }
    }

    // ---- Lifecycle ----

    /// Plan and commit one lifecycle command, retrying on version conflicts
    pub async fn execute(&self, ctx: &RequestContext, id: i32, command: Command) -> AppResult<ReservationDetails> {
        let operation = command.operation();
        let command = &command;

        let details = self
            .with_retry(operation.as_str(), ctx, || async move {
                let current = self.store.get_reservation(id).await?;
                let site = match command {
                    Command::Reschedule { .. } => Some(self.store.get_site(current.reservation.site_id).await?),
                    _ => None,
                };
                let update = lifecycle::plan(command, &current, ctx, &self.policy, site.as_ref())?;
                self.store.apply_update(&update, ctx.now).await
            })
            .await?;

        tracing::info!(
            request_id = %ctx.request_id,
            reservation_id = id,
            actor_id = ctx.actor_id,
            operation = operation.as_str(),
            status = %details.reservation.status,
            "Reservation updated"
        );
        self.notify(operation, &details, ctx).await;
        Ok(details)
    }

    pub async fn approve_for_delivery(&self, ctx: &RequestContext, id: i32) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::ApproveForDelivery).await
    }

    pub async fn deliver(&self, ctx: &RequestContext, id: i32, staff_id: i32) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::Deliver { staff_id }).await
    }

    pub async fn return_equipment(
        &self,
        ctx: &RequestContext,
        id: i32,
        staff_id: i32,
        actual_return_time: DateTime<Utc>,
    ) -> AppResult<ReservationDetails> {
        self.execute(
            ctx,
            id,
            Command::ReturnEquipment {
                staff_id,
                actual_return_time,
            },
        )
        .await
    }

    pub async fn triage(&self, ctx: &RequestContext, id: i32, outcome: TriageOutcome) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::Triage(outcome)).await
    }

    pub async fn resolve_maintenance(&self, ctx: &RequestContext, id: i32) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::ResolveMaintenance).await
    }

    pub async fn mark_no_show(&self, ctx: &RequestContext, id: i32) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::MarkNoShow).await
    }

    pub async fn cancel(&self, ctx: &RequestContext, id: i32, reason: Option<String>) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::Cancel { reason }).await
    }

    pub async fn reschedule(
        &self,
        ctx: &RequestContext,
        id: i32,
        new_start_time: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<ReservationDetails> {
        let reason = RescheduleReason::from(reason);
        self.execute(ctx, id, Command::Reschedule { new_start_time, reason }).await
    }

    pub async fn apply_manual_adjustment(
        &self,
        ctx: &RequestContext,
        id: i32,
        percentage: Decimal,
        reason: &str,
    ) -> AppResult<ReservationDetails> {
        let command = Command::ApplyManualAdjustment {
            percentage,
            reason: reason.to_string(),
        };
        self.execute(ctx, id, command).await
    }

    pub async fn archive(&self, ctx: &RequestContext, id: i32) -> AppResult<ReservationDetails> {
        self.execute(ctx, id, Command::Archive).await
    }

    // ---- Payments ----

    /// Loads the reservation and checks role and state before money moves
    async fn payable(&self, ctx: &RequestContext, id: i32, operation: Operation) -> AppResult<Reservation> {
        let current = self.store.get_reservation(id).await?.reservation;
        lifecycle::authorize(operation, ctx, current.customer_id)?;
        lifecycle::ensure_source(operation, current.status)?;
        Ok(current)
    }

    async fn record_upfront(&self, ctx: &RequestContext, id: i32, receipt: PaymentReceipt) -> AppResult<ReservationDetails> {
        let command = Command::RegisterUpfrontPayment {
            method: receipt.method,
            reference: receipt.reference,
            amount: receipt.amount,
        };
        self.execute(ctx, id, command).await
    }

    /// Capture and record whatever is still due upfront on a PENDING reservation
    pub async fn register_upfront_payment(
        &self,
        ctx: &RequestContext,
        id: i32,
        payment: &PaymentDetails,
    ) -> AppResult<ReservationDetails> {
        let current = self.payable(ctx, id, Operation::RegisterUpfrontPayment).await?;
        let outstanding = current.amount_due_now - current.amount_paid;
        if outstanding <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Reservation {} has no upfront amount outstanding",
                id
            )));
        }

        let receipt = self.payments.capture(&payment.reference, payment.method, outstanding).await?;
        match self.record_upfront(ctx, id, receipt.clone()).await {
            Ok(details) => Ok(details),
            Err(e) => {
                self.reverse(ctx, id, &receipt).await;
                Err(e)
            }
        }
    }

    /// Capture the remaining balance and record exactly what was captured.
    ///
    /// If the balance moved in the meantime the capture is refunded and
    /// `PaymentRequired` returned; the caller pays the new balance.
    pub async fn register_balance_payment(
        &self,
        ctx: &RequestContext,
        id: i32,
        payment: &PaymentDetails,
    ) -> AppResult<ReservationDetails> {
        let current = self.payable(ctx, id, Operation::RegisterBalancePayment).await?;
        let receipt = if current.balance_due > Decimal::ZERO {
            Some(
                self.payments
                    .capture(&payment.reference, payment.method, current.balance_due)
                    .await?,
            )
        } else {
            None
        };

        let command = Command::RegisterBalancePayment {
            method: payment.method,
            reference: payment.reference.clone(),
            amount: receipt.as_ref().map_or(Decimal::ZERO, |r| r.amount),
        };
        match self.execute(ctx, id, command).await {
            Ok(details) => Ok(details),
            Err(e) => {
                if let Some(receipt) = &receipt {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        reservation_id = id,
                        "Recording balance payment failed, refunding: {}",
                        e
                    );
                    self.reverse(ctx, id, receipt).await;
                }
                Err(e)
            }
        }
    }
}
