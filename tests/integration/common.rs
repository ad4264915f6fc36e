//! Shared fixtures: one site open every day, a small catalog, a fixed clock

use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rentdesk_server::{
    config::AppConfig,
    models::{CartLine, CreateReservationRequest, PaymentDetails, PaymentMethod, RequestContext, Resource, Role, Site, SiteHours},
    repository::memory::MemoryRepository,
    services::{
        notifier::ChangeNotifier,
        payments::{PaymentGateway, RecordingGateway},
        reservations::ReservationService,
    },
};

pub const CUSTOMER: i32 = 100;
pub const OTHER_CUSTOMER: i32 = 101;
pub const SELLER: i32 = 200;
pub const MECHANIC: i32 = 300;

pub const KAYAK: i32 = 1;
pub const PADDLEBOARD: i32 = 2;

static TRACING: Once = Once::new();

/// Route service logs through the test harness writer
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("rentdesk_server=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Monday 2026-11-02, 08:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 2, 8, 0, 0).unwrap()
}

/// Same day, 10:00 UTC
pub fn start() -> DateTime<Utc> {
    now() + Duration::hours(2)
}

pub fn ctx(actor_id: i32, role: Role, at: DateTime<Utc>) -> RequestContext {
    RequestContext::new(actor_id, role, at)
}

pub fn customer() -> RequestContext {
    ctx(CUSTOMER, Role::Customer, now())
}

pub fn seller_at(at: DateTime<Utc>) -> RequestContext {
    ctx(SELLER, Role::Seller, at)
}

pub fn mechanic_at(at: DateTime<Utc>) -> RequestContext {
    ctx(MECHANIC, Role::Mechanic, at)
}

fn site() -> Site {
    Site {
        id: 1,
        name: "Harbour".to_string(),
        hours: (0..7)
            .map(|day| SiteHours {
                site_id: 1,
                day_of_week: day,
                open_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                close_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            })
            .collect(),
    }
}

fn resource(id: i32, name: &str, price_per_hour: Decimal, total_units: i32) -> Resource {
    Resource {
        id,
        name: name.to_string(),
        category_id: 42,
        site_id: 1,
        price_per_hour,
        total_units,
        units_in_repair: 0,
        active: true,
    }
}

pub async fn seeded_store() -> MemoryRepository {
    let store = MemoryRepository::new();
    store.add_site(site()).await;
    store.add_resource(resource(KAYAK, "Kayak", dec!(10), 3)).await;
    store.add_resource(resource(PADDLEBOARD, "Paddleboard", dec!(15), 1)).await;
    store
}

pub fn service_with(store: &MemoryRepository, payments: Arc<dyn PaymentGateway>) -> ReservationService {
    init_test_tracing();
    ReservationService::new(
        Arc::new(store.clone()),
        payments,
        ChangeNotifier::new(None),
        &AppConfig::default(),
    )
}

pub fn service(store: &MemoryRepository) -> ReservationService {
    service_with(store, Arc::new(RecordingGateway::new()))
}

pub fn request(resource_id: i32, quantity: i32, hours: i32, start_time: DateTime<Utc>) -> CreateReservationRequest {
    CreateReservationRequest {
        lines: vec![CartLine {
            resource_id,
            quantity,
            hours,
        }],
        start_time,
        coupon_code: None,
        customer_id: None,
        is_advance_hint: None,
    }
}

pub fn card(reference: &str) -> PaymentDetails {
    PaymentDetails {
        method: PaymentMethod::Card,
        reference: reference.to_string(),
    }
}
