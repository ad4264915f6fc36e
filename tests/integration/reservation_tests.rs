//! Reservation service tests against the in-memory store

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rentdesk_server::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{reservation::ReservationUpdate, AdjustmentKind, PaymentMethod, ReservationDetails, ReservationStatus, Role, TriageOutcome},
    repository::{memory::MemoryRepository, ReservationStore},
    services::{
        notifier::ChangeNotifier,
        payments::{PaymentGateway, PaymentReceipt, RecordingGateway},
        reservations::ReservationService,
    },
};

use crate::common::*;

mock! {
    pub Gateway {}

    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn capture(&self, reference: &str, method: PaymentMethod, amount: Decimal) -> AppResult<PaymentReceipt>;
        async fn refund(&self, receipt: &PaymentReceipt) -> AppResult<()>;
    }
}

/// Records captures and, once armed, raises the reservation's total while
/// the capture is in flight, the way a concurrent staff adjustment would
struct AdjustingGateway {
    inner: RecordingGateway,
    store: MemoryRepository,
    armed_for: AtomicI32,
    surcharge: Decimal,
}

impl AdjustingGateway {
    fn new(store: &MemoryRepository, surcharge: Decimal) -> Self {
        Self {
            inner: RecordingGateway::new(),
            store: store.clone(),
            armed_for: AtomicI32::new(0),
            surcharge,
        }
    }

    fn arm(&self, reservation_id: i32) {
        self.armed_for.store(reservation_id, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for AdjustingGateway {
    async fn capture(&self, reference: &str, method: PaymentMethod, amount: Decimal) -> AppResult<PaymentReceipt> {
        let receipt = self.inner.capture(reference, method, amount).await?;

        let id = self.armed_for.swap(0, Ordering::SeqCst);
        if id != 0 {
            let current = self.store.get_reservation(id).await?.reservation;
            let mut next = current.clone();
            next.total += self.surcharge;
            next.balance_due += self.surcharge;
            self.store
                .apply_update(&ReservationUpdate::new(next, current.version), now())
                .await?;
        }
        Ok(receipt)
    }

    async fn refund(&self, receipt: &PaymentReceipt) -> AppResult<()> {
        self.inner.refund(receipt).await
    }
}

/// Create a same-day reservation for two kayak hours and pay it in full
async fn paid_reservation(service: &ReservationService) -> ReservationDetails {
    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    service
        .register_upfront_payment(&customer(), created.reservation.id, &card("tok-1"))
        .await
        .unwrap()
}

/// Paid, approved and handed out at the start time
async fn delivered_reservation(service: &ReservationService) -> ReservationDetails {
    let paid = paid_reservation(service).await;
    let id = paid.reservation.id;
    service
        .approve_for_delivery(&mechanic_at(start() - Duration::minutes(10)), id)
        .await
        .unwrap();
    service.deliver(&seller_at(start()), id, SELLER).await.unwrap()
}

fn end_of(details: &ReservationDetails) -> DateTime<Utc> {
    details.reservation.estimated_end_time
}

// ---- Creation and stock ----

#[tokio::test]
async fn test_create_prices_and_holds_stock() {
    let store = seeded_store().await;
    let service = service(&store);

    let details = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let r = &details.reservation;

    assert_eq!(r.status, ReservationStatus::Pending);
    assert_eq!(r.customer_id, CUSTOMER);
    assert_eq!(r.subtotal, dec!(20));
    assert_eq!(r.tax, dec!(3.60));
    assert_eq!(r.deposit, dec!(4.00));
    assert_eq!(r.total, dec!(27.60));
    assert!(!r.is_advance);
    assert_eq!(r.amount_due_now, dec!(27.60));
    assert_eq!(r.balance_due, r.total);
    assert_eq!(r.estimated_end_time, start() + Duration::hours(2));
    assert_eq!(details.line_items.len(), 1);
    assert_eq!(details.line_items[0].unit_price, dec!(10));
}

#[tokio::test]
async fn test_fourth_unit_is_rejected() {
    let store = seeded_store().await;
    let service = service(&store);

    for _ in 0..3 {
        service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    }
    let err = service
        .create(&customer(), &request(KAYAK, 1, 2, start() + Duration::hours(1)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::InsufficientStock {
            resource_id: KAYAK,
            requested: 1,
            available: 0
        }
    ));
}

#[tokio::test]
async fn test_adjacent_windows_do_not_collide() {
    let store = seeded_store().await;
    let service = service(&store);

    service.create(&customer(), &request(PADDLEBOARD, 1, 2, start())).await.unwrap();
    service
        .create(&customer(), &request(PADDLEBOARD, 1, 2, start() + Duration::hours(2)))
        .await
        .unwrap();

    let err = service
        .create(&customer(), &request(PADDLEBOARD, 1, 1, start() + Duration::hours(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
}

#[tokio::test]
async fn test_concurrent_creates_never_oversell() {
    let store = seeded_store().await;
    let service = service(&store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create(&customer(), &request(KAYAK, 1, 2, start())).await })
        })
        .collect();

    let mut created = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::InsufficientStock { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(created, 3);
    assert_eq!(rejected, 5);
}

#[tokio::test]
async fn test_create_validates_cart_and_schedule() {
    let store = seeded_store().await;
    let service = service(&store);

    let past = service
        .create(&customer(), &request(KAYAK, 1, 2, now() - Duration::hours(1)))
        .await
        .unwrap_err();
    assert!(matches!(past, AppError::Validation(_)));

    let unknown = service.create(&customer(), &request(99, 1, 2, start())).await.unwrap_err();
    assert!(matches!(unknown, AppError::ResourceNotFound(_)));

    // 20:00 + 2h ends after closing minus the buffer
    let late = service
        .create(&customer(), &request(KAYAK, 1, 2, now() + Duration::hours(12)))
        .await
        .unwrap_err();
    assert!(matches!(late, AppError::ExceedsClosingTime(_)));

    // 05:00 the next morning, before opening
    let early = service
        .create(&customer(), &request(KAYAK, 1, 1, now() + Duration::hours(21)))
        .await
        .unwrap_err();
    assert!(matches!(early, AppError::OutsideBusinessHours(_)));
}

#[tokio::test]
async fn test_unknown_coupon_is_not_stored() {
    let store = seeded_store().await;
    let service = service(&store);

    let mut req = request(KAYAK, 1, 2, start());
    req.coupon_code = Some("NOPE".to_string());
    let details = service.create(&customer(), &req).await.unwrap();

    assert_eq!(details.reservation.coupon_code, None);
    assert_eq!(details.reservation.discount, Decimal::ZERO);
}

#[tokio::test]
async fn test_advance_booking_collects_part_upfront() {
    let store = seeded_store().await;
    let service = service(&store);

    let tomorrow = start() + Duration::days(1);
    let details = service.create(&customer(), &request(KAYAK, 1, 2, tomorrow)).await.unwrap();

    assert!(details.reservation.is_advance);
    assert_eq!(details.reservation.amount_due_now, dec!(16.56));
}

// ---- Lifecycle ----

#[tokio::test]
async fn test_full_lifecycle_to_archive() {
    let store = seeded_store().await;
    let service = service(&store);

    let delivered = delivered_reservation(&service).await;
    let id = delivered.reservation.id;
    assert_eq!(delivered.reservation.status, ReservationStatus::InUse);
    assert_eq!(delivered.reservation.seller_id, Some(SELLER));

    let returned = service
        .return_equipment(&seller_at(end_of(&delivered)), id, SELLER, end_of(&delivered))
        .await
        .unwrap();
    assert_eq!(returned.reservation.status, ReservationStatus::Cleaning);
    assert_eq!(returned.reservation.penalty, Decimal::ZERO);

    let completed = service
        .triage(&mechanic_at(end_of(&delivered)), id, TriageOutcome::Ok)
        .await
        .unwrap();
    assert_eq!(completed.reservation.status, ReservationStatus::Completed);

    let owner = ctx(1, Role::Owner, end_of(&delivered));
    let archived = service.archive(&owner, id).await.unwrap();
    assert_eq!(archived.reservation.status, ReservationStatus::Returned);
    assert_eq!(archived.reservation.version, completed.reservation.version + 1);
}

#[tokio::test]
async fn test_approve_requires_payment_and_window() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let id = created.reservation.id;
    let err = service
        .approve_for_delivery(&mechanic_at(start() - Duration::minutes(5)), id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentRequired(_)));

    service.register_upfront_payment(&customer(), id, &card("tok-2")).await.unwrap();
    let err = service
        .approve_for_delivery(&mechanic_at(start() - Duration::hours(1)), id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TooEarly(_)));

    let ready = service
        .approve_for_delivery(&mechanic_at(start() - Duration::minutes(15)), id)
        .await
        .unwrap();
    assert_eq!(ready.reservation.status, ReservationStatus::Ready);
}

#[tokio::test]
async fn test_invalid_transitions_leave_state_unchanged() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let id = created.reservation.id;

    let err = service.deliver(&seller_at(start()), id, SELLER).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidStateTransition { ref from, .. } if from == "PENDING"
    ));

    service.cancel(&customer(), id, None).await.unwrap();
    let err = service.cancel(&customer(), id, None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    let stored = store.get_reservation(id).await.unwrap();
    assert_eq!(stored.reservation.status, ReservationStatus::Cancelled);
    assert_eq!(stored.reservation.version, created.reservation.version + 1);
}

#[tokio::test]
async fn test_cancel_releases_stock() {
    let store = seeded_store().await;
    let service = service(&store);

    let held = service.create(&customer(), &request(PADDLEBOARD, 1, 2, start())).await.unwrap();
    service.cancel(&customer(), held.reservation.id, Some("changed plans".to_string())).await.unwrap();

    service.create(&customer(), &request(PADDLEBOARD, 1, 2, start())).await.unwrap();
}

#[tokio::test]
async fn test_role_gating() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let id = created.reservation.id;

    let err = service.approve_for_delivery(&customer(), id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let stranger = ctx(OTHER_CUSTOMER, Role::Customer, now());
    assert!(matches!(service.cancel(&stranger, id, None).await.unwrap_err(), AppError::Forbidden(_)));
    assert!(matches!(service.get(&stranger, id).await.unwrap_err(), AppError::Forbidden(_)));
    assert!(matches!(
        service.list(&stranger, Some(CUSTOMER), None).await.unwrap_err(),
        AppError::Forbidden(_)
    ));

    let err = service
        .reschedule(&seller_at(now()), id, start() + Duration::hours(3), "weather")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = service
        .apply_manual_adjustment(&seller_at(now()), id, dec!(-10), "goodwill")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_list_is_scoped_for_customers() {
    let store = seeded_store().await;
    let service = service(&store);

    service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let stranger = ctx(OTHER_CUSTOMER, Role::Customer, now());
    service.create(&stranger, &request(KAYAK, 1, 2, start())).await.unwrap();

    let own = service.list(&customer(), None, None).await.unwrap();
    assert_eq!(own.len(), 1);
    assert!(own.iter().all(|r| r.customer_id == CUSTOMER));

    let all = service.list(&seller_at(now()), None, Some(ReservationStatus::Pending)).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_late_return_adds_penalty() {
    let store = seeded_store().await;
    let service = service(&store);

    let delivered = delivered_reservation(&service).await;
    let id = delivered.reservation.id;
    let returned_at = end_of(&delivered) + Duration::hours(2);

    let returned = service
        .return_equipment(&seller_at(returned_at), id, SELLER, returned_at)
        .await
        .unwrap();
    let r = &returned.reservation;

    // 2 late hours x 10/h x multiplier 2
    assert_eq!(r.penalty, dec!(40));
    assert_eq!(r.total, dec!(67.60));
    assert_eq!(r.balance_due, dec!(40));
    assert_eq!(r.actual_return_time, Some(returned_at));
    assert!(returned
        .adjustments
        .iter()
        .any(|a| a.kind == AdjustmentKind::LatePenalty && a.amount == dec!(40)));

    let settled = service
        .register_balance_payment(&customer(), id, &card("tok-balance"))
        .await
        .unwrap();
    assert_eq!(settled.reservation.balance_due, Decimal::ZERO);
    assert_eq!(settled.reservation.amount_paid, dec!(67.60));
}

#[tokio::test]
async fn test_return_within_grace_is_free() {
    let store = seeded_store().await;
    let service = service(&store);

    let delivered = delivered_reservation(&service).await;
    let returned_at = end_of(&delivered) + Duration::minutes(10);
    let returned = service
        .return_equipment(&seller_at(returned_at), delivered.reservation.id, SELLER, returned_at)
        .await
        .unwrap();

    assert_eq!(returned.reservation.penalty, Decimal::ZERO);
    assert_eq!(returned.reservation.balance_due, Decimal::ZERO);
}

#[tokio::test]
async fn test_reschedule_fee_depends_on_reason() {
    let store = seeded_store().await;
    let service = service(&store);

    let a = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let b = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let later = start() + Duration::hours(4);

    let weather = service.reschedule(&customer(), a.reservation.id, later, "weather").await.unwrap();
    assert_eq!(weather.reservation.total, dec!(27.60));
    assert_eq!(weather.reservation.start_time, later);
    assert_eq!(weather.reservation.estimated_end_time, later + Duration::hours(2));

    let personal = service.reschedule(&customer(), b.reservation.id, later, "personal").await.unwrap();
    assert_eq!(personal.reservation.total, dec!(37.60));
    assert_eq!(personal.reservation.adjustments_total, dec!(10));
    assert!(personal
        .adjustments
        .iter()
        .any(|adj| adj.kind == AdjustmentKind::RescheduleFee && adj.amount == dec!(10)));
}

#[tokio::test]
async fn test_reschedule_rechecks_stock_and_hours() {
    let store = seeded_store().await;
    let service = service(&store);

    let moving = service.create(&customer(), &request(PADDLEBOARD, 1, 2, start())).await.unwrap();
    let later = start() + Duration::hours(4);
    service.create(&customer(), &request(PADDLEBOARD, 1, 2, later)).await.unwrap();

    let err = service
        .reschedule(&customer(), moving.reservation.id, later, "weather")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let err = service
        .reschedule(&customer(), moving.reservation.id, now() + Duration::hours(12), "weather")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExceedsClosingTime(_)));

    let err = service
        .reschedule(&customer(), moving.reservation.id, now() - Duration::hours(1), "weather")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let unchanged = store.get_reservation(moving.reservation.id).await.unwrap();
    assert_eq!(unchanged.reservation.start_time, start());
}

#[tokio::test]
async fn test_no_show_after_grace() {
    let store = seeded_store().await;
    let service = service(&store);

    let paid = paid_reservation(&service).await;
    let id = paid.reservation.id;
    service
        .approve_for_delivery(&mechanic_at(start() - Duration::minutes(10)), id)
        .await
        .unwrap();

    let err = service
        .mark_no_show(&seller_at(start() + Duration::minutes(5)), id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TooEarly(_)));

    let no_show = service
        .mark_no_show(&seller_at(start() + Duration::minutes(11)), id)
        .await
        .unwrap();
    assert_eq!(no_show.reservation.status, ReservationStatus::NoShow);
}

#[tokio::test]
async fn test_faulty_triage_takes_units_out_of_rotation() {
    let store = seeded_store().await;
    let service = service(&store);

    let delivered = delivered_reservation(&service).await;
    let id = delivered.reservation.id;
    let at = end_of(&delivered);
    service.return_equipment(&seller_at(at), id, SELLER, at).await.unwrap();

    let maintenance = service.triage(&mechanic_at(at), id, TriageOutcome::Faulty).await.unwrap();
    assert_eq!(maintenance.reservation.status, ReservationStatus::Maintenance);
    assert_eq!(store.get_resource(KAYAK).await.unwrap().units_in_repair, 1);

    // Only two kayaks remain rentable
    let later = at + Duration::hours(1);
    let err = service.create(&customer(), &request(KAYAK, 3, 1, later)).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 2, .. }));

    let repaired = service.resolve_maintenance(&mechanic_at(at), id).await.unwrap();
    assert_eq!(repaired.reservation.status, ReservationStatus::Completed);
    assert_eq!(store.get_resource(KAYAK).await.unwrap().units_in_repair, 0);
    service.create(&customer(), &request(KAYAK, 3, 1, later)).await.unwrap();
}

#[tokio::test]
async fn test_manual_adjustment_is_ledgered() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let admin = ctx(2, Role::Admin, now());

    let err = service
        .apply_manual_adjustment(&admin, created.reservation.id, dec!(-10), "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // 10% off the service portion (27.60 - 4.00 deposit)
    let adjusted = service
        .apply_manual_adjustment(&admin, created.reservation.id, dec!(-10), "loyal customer")
        .await
        .unwrap();
    assert_eq!(adjusted.reservation.adjustments_total, dec!(-2.36));
    assert_eq!(adjusted.reservation.total, dec!(25.24));
    assert_eq!(adjusted.adjustments.len(), 1);
    assert_eq!(adjusted.adjustments[0].created_by, 2);
}

// ---- Payments ----

#[tokio::test]
async fn test_book_captures_upfront_amount() {
    let store = seeded_store().await;
    let service = service(&store);

    let booked = service
        .book(&customer(), &request(KAYAK, 1, 2, start()), &card("tok-book"))
        .await
        .unwrap();

    assert_eq!(booked.reservation.amount_paid, dec!(27.60));
    assert_eq!(booked.reservation.balance_due, Decimal::ZERO);
    assert_eq!(booked.reservation.payment_method, Some(PaymentMethod::Card));
    assert_eq!(booked.reservation.payment_reference.as_deref(), Some("tok-book"));
}

#[tokio::test]
async fn test_failed_payment_cancels_reservation() {
    let store = seeded_store().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_capture()
        .times(1)
        .returning(|_, _, _| Err(AppError::PaymentFailed("card declined".to_string())));
    let service = service_with(&store, Arc::new(gateway));

    let err = service
        .book(&customer(), &request(PADDLEBOARD, 1, 2, start()), &card("tok-declined"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentFailed(_)));

    let mine = service.list(&customer(), None, None).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ReservationStatus::Cancelled);

    // The single paddleboard is free again
    let holdings = store.holdings(PADDLEBOARD, &mine[0].window()).await.unwrap();
    assert!(holdings.is_empty());
}

#[tokio::test]
async fn test_unrecorded_booking_payment_is_refunded() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::new());
    let service = service_with(&store, gateway.clone());

    // Creation goes through; both attempts to record the capture conflict
    store.inject_conflicts(2).await;
    let err = service
        .book(&customer(), &request(KAYAK, 1, 2, start()), &card("tok-lost"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)));

    let captured = gateway.captured().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(gateway.refunded().await, captured);

    let mine = service.list(&customer(), None, None).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, ReservationStatus::Cancelled);
    assert_eq!(mine[0].amount_paid, Decimal::ZERO);

    let holdings = store.holdings(KAYAK, &mine[0].window()).await.unwrap();
    assert!(holdings.is_empty());
}

#[tokio::test]
async fn test_unrecorded_upfront_payment_is_refunded() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::new());
    let service = service_with(&store, gateway.clone());

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    let id = created.reservation.id;

    store.inject_conflicts(2).await;
    let err = service
        .register_upfront_payment(&customer(), id, &card("tok-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)));
    assert_eq!(gateway.refunded().await, gateway.captured().await);

    // Still payable; the customer can try again
    let current = service.get(&customer(), id).await.unwrap().reservation;
    assert_eq!(current.status, ReservationStatus::Pending);
    assert_eq!(current.amount_paid, Decimal::ZERO);

    let paid = service.register_upfront_payment(&customer(), id, &card("tok-2")).await.unwrap();
    assert_eq!(paid.reservation.amount_paid, created.reservation.amount_due_now);
}

#[tokio::test]
async fn test_balance_moved_during_capture_is_refunded() {
    let store = seeded_store().await;
    let gateway = Arc::new(AdjustingGateway::new(&store, dec!(10)));
    let service = service_with(&store, gateway.clone());

    let delivered = delivered_reservation(&service).await;
    let id = delivered.reservation.id;
    let returned_at = end_of(&delivered) + Duration::hours(2);
    let returned = service
        .return_equipment(&seller_at(returned_at), id, SELLER, returned_at)
        .await
        .unwrap();
    assert_eq!(returned.reservation.balance_due, dec!(40));

    gateway.arm(id);
    let err = service
        .register_balance_payment(&customer(), id, &card("tok-balance"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentRequired(_)));

    let refunded = gateway.inner.refunded().await;
    assert_eq!(refunded.len(), 1);
    assert_eq!(refunded[0].amount, dec!(40));

    // Nothing was recorded against the moved balance
    let current = service.get(&customer(), id).await.unwrap().reservation;
    assert_eq!(current.amount_paid, returned.reservation.amount_paid);
    assert_eq!(current.balance_due, dec!(50));
    assert_eq!(current.total, dec!(77.60));

    let settled = service
        .register_balance_payment(&customer(), id, &card("tok-balance-2"))
        .await
        .unwrap();
    assert_eq!(settled.reservation.balance_due, Decimal::ZERO);
    assert_eq!(settled.reservation.amount_paid, dec!(77.60));
}

// ---- Concurrency ----

#[tokio::test]
async fn test_single_conflict_is_retried() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    store.inject_conflicts(1).await;

    let cancelled = service.cancel(&customer(), created.reservation.id, None).await.unwrap();
    assert_eq!(cancelled.reservation.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn test_repeated_conflict_is_surfaced() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    store.inject_conflicts(2).await;

    let err = service.cancel(&customer(), created.reservation.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)));

    let unchanged = store.get_reservation(created.reservation.id).await.unwrap();
    assert_eq!(unchanged.reservation.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_stale_version_is_rejected_by_store() {
    let store = seeded_store().await;
    let service = service(&store);

    let created = service.create(&customer(), &request(KAYAK, 1, 2, start())).await.unwrap();
    service.cancel(&customer(), created.reservation.id, None).await.unwrap();

    let mut stale = ReservationUpdate::new(
        created.reservation.clone(),
        created.reservation.version,
    );
    stale.reservation.status = ReservationStatus::Ready;
    let err = store.apply_update(&stale, now()).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)));
}

// ---- Notifications ----

#[tokio::test]
async fn test_committed_writes_are_broadcast() {
    init_test_tracing();
    let store = seeded_store().await;

    let notifier = ChangeNotifier::new(None);
    let mut events = notifier.subscribe();
    let service = ReservationService::new(
        Arc::new(store.clone()),
        Arc::new(RecordingGateway::new()),
        notifier,
        &AppConfig::default(),
    );

    let created = service.create(&customer(), &request(KAYAK, 2, 2, start())).await.unwrap();
    service.cancel(&customer(), created.reservation.id, None).await.unwrap();

    let first = events.recv().await.unwrap();
    assert_eq!(first.reservation_id, created.reservation.id);
    assert_eq!(first.operation, "create");
    assert_eq!(first.resource_ids, vec![KAYAK]);

    let second = events.recv().await.unwrap();
    assert_eq!(second.status, ReservationStatus::Cancelled);
}
