//! In-process HTTP tests: the full router over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use rentdesk_server::{
    api,
    config::AppConfig,
    models::{Role, UserClaims},
    services::{payments::RecordingGateway, Services},
    AppState,
};

use crate::common::*;

async fn app() -> (Router, String) {
    init_test_tracing();
    let config = AppConfig::default();
    let store = seeded_store().await;
    let services = Services::new(Arc::new(store), Arc::new(RecordingGateway::new()), &config, None);
    let secret = config.auth.jwt_secret.clone();
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };
    (api::create_router(state), secret)
}

fn bearer(secret: &str, user_id: i32, role: Role) -> String {
    let now = Utc::now().timestamp();
    let token = UserClaims {
        sub: format!("user-{}", user_id),
        user_id,
        role,
        exp: now + 3600,
        iat: now,
    }
    .create_token(secret)
    .unwrap();
    format!("Bearer {}", token)
}

/// Tomorrow at 10:00 UTC, inside the fixture site's hours
fn tomorrow_morning() -> String {
    let day = (Utc::now() + Duration::days(1)).date_naive();
    day.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        .and_utc()
        .to_rfc3339()
}

async fn send(app: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_and_readiness() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["sites"], 1);
    assert_eq!(body["redis_mirroring"], false);
}

#[tokio::test]
async fn test_reservation_requires_token() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/reservations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn test_create_then_fetch_reservation() {
    let (app, secret) = app().await;
    let auth = bearer(&secret, CUSTOMER, Role::Customer);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/reservations",
        Some(&auth),
        Some(json!({
            "lines": [{"resource_id": KAYAK, "quantity": 1, "hours": 2}],
            "start_time": tomorrow_morning()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["reservation"]["status"], "PENDING");
    let total: Decimal = created["reservation"]["total"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, dec!(27.60));

    let id = created["reservation"]["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/reservations/{}", id), Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["line_items"][0]["resource_id"], KAYAK);

    // A customer cannot approve their own reservation
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/reservations/{}/approve", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2);
}

#[tokio::test]
async fn test_overbooking_maps_to_conflict() {
    let (app, secret) = app().await;
    let auth = bearer(&secret, CUSTOMER, Role::Customer);
    let cart = json!({
        "lines": [{"resource_id": PADDLEBOARD, "quantity": 1, "hours": 2}],
        "start_time": tomorrow_morning()
    });

    let (status, _) = send(&app, Method::POST, "/api/v1/reservations", Some(&auth), Some(cart.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, "/api/v1/reservations", Some(&auth), Some(cart)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InsufficientStock");
}

#[tokio::test]
async fn test_empty_cart_is_a_validation_error() {
    let (app, secret) = app().await;
    let auth = bearer(&secret, CUSTOMER, Role::Customer);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/quotes",
        Some(&auth),
        Some(json!({"lines": [], "start_time": tomorrow_morning()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}
