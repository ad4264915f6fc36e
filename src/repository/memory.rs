//! In-memory reservation store
//!
//! One async mutex guards the whole state, so every operation (including the
//! availability check and the write that follows it) is atomic. Used by the
//! integration tests and for running the server without Postgres.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::ReservationStore;
use crate::{
    engine::{
        availability::{aggregate_demand, verify_stock},
        Holding, StockDemand, TimeWindow,
    },
    error::{AppError, AppResult},
    models::{
        reservation::{NewReservation, ReservationUpdate},
        Adjustment, LineItem, Promotion, Reservation, ReservationDetails, ReservationStatus, Resource, Site,
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    resources: BTreeMap<i32, Resource>,
    sites: BTreeMap<i32, Site>,
    promotions: BTreeMap<i32, Promotion>,
    reservations: BTreeMap<i32, Reservation>,
    line_items: Vec<LineItem>,
    adjustments: Vec<Adjustment>,
    next_reservation_id: i32,
    next_line_item_id: i32,
    next_adjustment_id: i32,
    /// Number of upcoming `apply_update` calls to fail with a conflict
    injected_conflicts: u32,
}

impl MemoryState {
    fn holdings(&self, resource_id: i32, window: &TimeWindow) -> Vec<Holding> {
        self.line_items
            .iter()
            .filter(|li| li.resource_id == resource_id)
            .filter_map(|li| {
                let r = self.reservations.get(&li.reservation_id)?;
                Some(Holding {
                    reservation_id: r.id,
                    resource_id: li.resource_id,
                    quantity: li.quantity,
                    status: r.status,
                    window: TimeWindow::from_hours(r.start_time, li.hours),
                })
            })
            .filter(|h| h.status.holds_stock() && h.window.overlaps(window))
            .collect()
    }

    fn verify(&self, demands: &[StockDemand], exclude: Option<i32>) -> AppResult<()> {
        for demand in demands {
            let resource = self
                .resources
                .get(&demand.resource_id)
                .ok_or_else(|| AppError::ResourceNotFound(format!("Resource {} not found", demand.resource_id)))?;
            let holdings = self.holdings(demand.resource_id, &demand.window);
            verify_stock(resource, &holdings, demand, exclude)?;
        }
        Ok(())
    }

    fn details(&self, id: i32) -> AppResult<ReservationDetails> {
        let reservation = self
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))?;
        Ok(ReservationDetails {
            reservation,
            line_items: self
                .line_items
                .iter()
                .filter(|li| li.reservation_id == id)
                .cloned()
                .collect(),
            adjustments: self
                .adjustments
                .iter()
                .filter(|a| a.reservation_id == id)
                .cloned()
                .collect(),
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_resource(&self, resource: Resource) {
        self.state.lock().await.resources.insert(resource.id, resource);
    }

    pub async fn add_site(&self, site: Site) {
        self.state.lock().await.sites.insert(site.id, site);
    }

    pub async fn add_promotion(&self, promotion: Promotion) {
        self.state.lock().await.promotions.insert(promotion.id, promotion);
    }

    /// Make the next `count` lifecycle writes fail with `ConcurrencyConflict`
    pub async fn inject_conflicts(&self, count: u32) {
        self.state.lock().await.injected_conflicts = count;
    }
}

#[async_trait]
impl ReservationStore for MemoryRepository {
    async fn list_resources(&self) -> AppResult<Vec<Resource>> {
        Ok(self.state.lock().await.resources.values().cloned().collect())
    }

    async fn get_resource(&self, id: i32) -> AppResult<Resource> {
        self.state
            .lock()
            .await
            .resources
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::ResourceNotFound(format!("Resource {} not found", id)))
    }

    async fn list_sites(&self) -> AppResult<Vec<Site>> {
        Ok(self.state.lock().await.sites.values().cloned().collect())
    }

    async fn get_site(&self, id: i32) -> AppResult<Site> {
        self.state
            .lock()
            .await
            .sites
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))
    }

    async fn active_promotions(&self) -> AppResult<Vec<Promotion>> {
        Ok(self
            .state
            .lock()
            .await
            .promotions
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn holdings(&self, resource_id: i32, window: &TimeWindow) -> AppResult<Vec<Holding>> {
        Ok(self.state.lock().await.holdings(resource_id, window))
    }

    async fn get_reservation(&self, id: i32) -> AppResult<ReservationDetails> {
        self.state.lock().await.details(id)
    }

    async fn list_reservations(
        &self,
        customer_id: Option<i32>,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut list: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| customer_id.map_or(true, |c| r.customer_id == c))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn insert_reservation(&self, draft: &NewReservation, now: DateTime<Utc>) -> AppResult<ReservationDetails> {
        let mut state = self.state.lock().await;

        let demands = aggregate_demand(
            draft
                .line_items
                .iter()
                .map(|li| (li.resource_id, li.quantity, li.window(draft.start_time))),
        );
        state.verify(&demands, None)?;

        state.next_reservation_id += 1;
        let id = state.next_reservation_id;
        let reservation = Reservation {
            id,
            customer_id: draft.customer_id,
            seller_id: None,
            site_id: draft.site_id,
            status: ReservationStatus::Pending,
            start_time: draft.start_time,
            estimated_end_time: draft.estimated_end_time,
            delivered_at: None,
            actual_return_time: None,
            subtotal: draft.subtotal,
            discount: draft.discount,
            tax: draft.tax,
            deposit: draft.deposit,
            penalty: Default::default(),
            adjustments_total: Default::default(),
            total: draft.total,
            amount_due_now: draft.amount_due_now,
            amount_paid: Default::default(),
            balance_due: draft.total,
            is_advance: draft.is_advance,
            coupon_code: draft.coupon_code.clone(),
            payment_method: None,
            payment_reference: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.reservations.insert(id, reservation);

        for li in &draft.line_items {
            state.next_line_item_id += 1;
            let line_id = state.next_line_item_id;
            state.line_items.push(LineItem {
                id: line_id,
                reservation_id: id,
                resource_id: li.resource_id,
                quantity: li.quantity,
                hours: li.hours,
                unit_price: li.unit_price,
            });
        }

        state.details(id)
    }

    async fn apply_update(&self, update: &ReservationUpdate, now: DateTime<Utc>) -> AppResult<ReservationDetails> {
        let mut state = self.state.lock().await;
        let next = &update.reservation;

        if state.injected_conflicts > 0 {
            state.injected_conflicts -= 1;
            return Err(AppError::ConcurrencyConflict(format!(
                "Reservation {} changed concurrently",
                next.id
            )));
        }

        let stored_version = state
            .reservations
            .get(&next.id)
            .map(|r| r.version)
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", next.id)))?;
        if stored_version != update.expected_version {
            return Err(AppError::ConcurrencyConflict(format!(
                "Reservation {} changed since version {}",
                next.id, update.expected_version
            )));
        }

        if update.recheck_stock {
            let demands = aggregate_demand(
                state
                    .line_items
                    .iter()
                    .filter(|li| li.reservation_id == next.id)
                    .map(|li| (li.resource_id, li.quantity, TimeWindow::from_hours(next.start_time, li.hours))),
            );
            state.verify(&demands, Some(next.id))?;
        }

        // All checks passed; nothing below can fail
        let mut stored = next.clone();
        stored.version = update.expected_version + 1;
        stored.updated_at = now;
        state.reservations.insert(stored.id, stored);

        if let Some(adj) = &update.adjustment {
            state.next_adjustment_id += 1;
            let adjustment_id = state.next_adjustment_id;
            state.adjustments.push(Adjustment {
                id: adjustment_id,
                reservation_id: next.id,
                kind: adj.kind,
                amount: adj.amount,
                reason: adj.reason.clone(),
                created_by: adj.created_by,
                created_at: now,
            });
        }

        for (resource_id, delta) in &update.repair_moves {
            if let Some(resource) = state.resources.get_mut(resource_id) {
                resource.units_in_repair = (resource.units_in_repair + delta).max(0);
            }
        }

        state.details(next.id)
    }
}
