//! Repository layer for database operations
//!
//! [`ReservationStore`] is the seam between services and persistence. The
//! Postgres [`Repository`] is used in production; [`memory::MemoryRepository`]
//! backs tests and local development.

pub mod memory;
pub mod promotions;
pub mod reservations;
pub mod resources;
pub mod sites;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    engine::{Holding, TimeWindow},
    error::{AppError, AppResult},
    models::{
        reservation::{NewReservation, ReservationUpdate},
        Promotion, Reservation, ReservationDetails, ReservationStatus, Resource, Site,
    },
};

/// Storage operations needed by the reservation engine.
///
/// `insert_reservation` and `apply_update` are atomic: the availability
/// re-check (when one is needed) and the write either both happen or
/// neither does. `apply_update` fails with `ConcurrencyConflict` when the
/// stored version no longer matches `expected_version`.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn list_resources(&self) -> AppResult<Vec<Resource>>;

    async fn get_resource(&self, id: i32) -> AppResult<Resource>;

    async fn list_sites(&self) -> AppResult<Vec<Site>>;

    async fn get_site(&self, id: i32) -> AppResult<Site>;

    async fn active_promotions(&self) -> AppResult<Vec<Promotion>>;

    /// Stock-holding line items of `resource_id` overlapping `window`
    async fn holdings(&self, resource_id: i32, window: &TimeWindow) -> AppResult<Vec<Holding>>;

    async fn get_reservation(&self, id: i32) -> AppResult<ReservationDetails>;

    async fn list_reservations(
        &self,
        customer_id: Option<i32>,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>>;

    async fn insert_reservation(&self, draft: &NewReservation, now: DateTime<Utc>) -> AppResult<ReservationDetails>;

    async fn apply_update(&self, update: &ReservationUpdate, now: DateTime<Utc>) -> AppResult<ReservationDetails>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Serialization failures and deadlocks are reported as retryable conflicts
pub(crate) fn conflict_or_persistence(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return AppError::ConcurrencyConflict(db.message().to_string());
        }
    }
    AppError::Persistence(err)
}

#[async_trait]
impl ReservationStore for Repository {
    async fn list_resources(&self) -> AppResult<Vec<Resource>> {
        self.resources_list().await
    }

    async fn get_resource(&self, id: i32) -> AppResult<Resource> {
        self.resources_get_by_id(id).await
    }

    async fn list_sites(&self) -> AppResult<Vec<Site>> {
        self.sites_list().await
    }

    async fn get_site(&self, id: i32) -> AppResult<Site> {
        self.sites_get_by_id(id).await
    }

    async fn active_promotions(&self) -> AppResult<Vec<Promotion>> {
        self.promotions_active().await
    }

    async fn holdings(&self, resource_id: i32, window: &TimeWindow) -> AppResult<Vec<Holding>> {
        self.reservations_holdings(&self.pool, &[resource_id], window).await
    }

    async fn get_reservation(&self, id: i32) -> AppResult<ReservationDetails> {
        self.reservations_get_details(id).await
    }

    async fn list_reservations(
        &self,
        customer_id: Option<i32>,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        self.reservations_list(customer_id, status).await
    }

    async fn insert_reservation(&self, draft: &NewReservation, now: DateTime<Utc>) -> AppResult<ReservationDetails> {
        self.reservations_insert(draft, now).await
    }

    async fn apply_update(&self, update: &ReservationUpdate, now: DateTime<Utc>) -> AppResult<ReservationDetails> {
        self.reservations_apply_update(update, now).await
    }
}
