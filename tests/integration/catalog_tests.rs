//! Catalog reads through the full service container

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::Duration;
use rust_decimal_macros::dec;

use rentdesk_server::{
    config::AppConfig,
    error::AppError,
    models::{quote::QuoteRequest, BenefitKind, CartLine, Promotion, PromotionKind},
    repository::memory::MemoryRepository,
    services::{payments::RecordingGateway, Services},
};

use crate::common::*;

fn services(store: &MemoryRepository) -> Services {
    init_test_tracing();
    Services::new(
        Arc::new(store.clone()),
        Arc::new(RecordingGateway::new()),
        &AppConfig::default(),
        None,
    )
}

fn paddle_promo() -> Promotion {
    Promotion {
        id: 1,
        name: "Paddle 15".to_string(),
        kind: PromotionKind::TimeRule,
        automatic: true,
        coupon_code: None,
        resource_id: None,
        category_id: Some(42),
        threshold: 2,
        benefit: BenefitKind::Percentage,
        value: dec!(15),
        active: true,
    }
}

#[tokio::test]
async fn test_quote_applies_automatic_promotion() {
    let store = seeded_store().await;
    store.add_promotion(paddle_promo()).await;
    let services = services(&store);

    let request = QuoteRequest {
        lines: vec![CartLine {
            resource_id: KAYAK,
            quantity: 1,
            hours: 2,
        }],
        start_time: start(),
        coupon_code: None,
    };
    let quote = services.catalog.quote(&request, &customer()).await.unwrap();

    assert_eq!(quote.subtotal, dec!(20));
    assert_eq!(quote.discount_total, dec!(3));
    assert_eq!(quote.total, dec!(23.46));
    assert_eq!(quote.applied_promotions.len(), 1);
}

#[tokio::test]
async fn test_availability_follows_committed_writes() {
    let store = seeded_store().await;
    let services = services(&store);
    let end = start() + Duration::hours(2);

    let before = services.catalog.availability(KAYAK, start(), end).await.unwrap();
    assert_eq!(before.available_units, 3);

    services
        .reservations
        .create(&customer(), &request(KAYAK, 1, 2, start()))
        .await
        .unwrap();

    // The cache entry is dropped by the change listener, not by the write itself
    let mut units = before.available_units;
    for _ in 0..100 {
        units = services.catalog.availability(KAYAK, start(), end).await.unwrap().available_units;
        if units == 2 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(units, 2);
}

#[tokio::test]
async fn test_availability_rejects_inverted_window() {
    let store = seeded_store().await;
    let services = services(&store);

    let err = services
        .catalog
        .availability(KAYAK, start(), start() - Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
