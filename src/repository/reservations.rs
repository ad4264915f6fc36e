//! Reservation methods on Repository
//!
//! Stock-affecting writes run in one transaction that first locks the
//! involved resource rows (see [`Repository::resources_lock`]), then checks
//! availability, then writes. Lifecycle writes are additionally guarded by
//! the reservation `version`.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Executor, Postgres, Transaction};

use super::{conflict_or_persistence, Repository};
use crate::{
    engine::{
        availability::{aggregate_demand, verify_stock},
        Holding, StockDemand, TimeWindow,
    },
    error::{AppError, AppResult},
    models::{
        reservation::{AdjustmentRow, NewReservation, ReservationRow, ReservationUpdate},
        Adjustment, LineItem, Reservation, ReservationDetails, ReservationStatus, Resource,
    },
};

/// Candidate holding row; status and window are resolved in Rust
#[derive(Debug, sqlx::FromRow)]
struct HoldingRow {
    reservation_id: i32,
    resource_id: i32,
    quantity: i32,
    hours: i32,
    status: String,
    start_time: DateTime<Utc>,
}

fn into_reservation(row: ReservationRow) -> AppResult<Reservation> {
    let id = row.id;
    Reservation::try_from(row).map_err(|e| AppError::Internal(format!("Reservation {} is malformed: {}", id, e)))
}

impl Repository {
    /// Line items of stock-holding reservations for `resource_ids` overlapping `window`
    pub(crate) async fn reservations_holdings<'e, E>(
        &self,
        executor: E,
        resource_ids: &[i32],
        window: &TimeWindow,
    ) -> AppResult<Vec<Holding>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT r.id AS reservation_id, li.resource_id, li.quantity, li.hours, r.status, r.start_time
            FROM line_items li
            JOIN reservations r ON r.id = li.reservation_id
            WHERE li.resource_id = ANY($1)
              AND r.start_time < $3
              AND r.estimated_end_time > $2
            "#,
        )
        .bind(resource_ids)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(executor)
        .await
        .map_err(conflict_or_persistence)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                // Unknown labels never hold stock
                let status: ReservationStatus = match row.status.parse() {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::warn!(reservation_id = row.reservation_id, "Skipping holding: {}", e);
                        return None;
                    }
                };
                Some(Holding {
                    reservation_id: row.reservation_id,
                    resource_id: row.resource_id,
                    quantity: row.quantity,
                    status,
                    window: TimeWindow::from_hours(row.start_time, row.hours),
                })
            })
            .filter(|h| h.status.holds_stock() && h.window.overlaps(window))
            .collect())
    }

    async fn reservations_line_items<'e, E>(&self, executor: E, reservation_id: i32) -> AppResult<Vec<LineItem>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, LineItem>(
            r#"
            SELECT id, reservation_id, resource_id, quantity, hours, unit_price
            FROM line_items
            WHERE reservation_id = $1
            ORDER BY id
            "#,
        )
        .bind(reservation_id)
        .fetch_all(executor)
        .await
        .map_err(conflict_or_persistence)?;
        Ok(items)
    }

    /// Get a reservation with its line items and adjustments
    pub async fn reservations_get_details(&self, id: i32) -> AppResult<ReservationDetails> {
        let row = sqlx::query_as::<_, ReservationRow>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))?;

        let line_items = self.reservations_line_items(&self.pool, id).await?;

        let adjustments = sqlx::query_as::<_, AdjustmentRow>(
            "SELECT * FROM adjustments WHERE reservation_id = $1 ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| Adjustment::try_from(row).map_err(AppError::Internal))
        .collect::<AppResult<Vec<_>>>()?;

        Ok(ReservationDetails {
            reservation: into_reservation(row)?,
            line_items,
            adjustments,
        })
    }

    /// List reservations, newest start first
    pub async fn reservations_list(
        &self,
        customer_id: Option<i32>,
        status: Option<ReservationStatus>,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::INT IS NULL OR customer_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY start_time DESC, id DESC
            "#,
        )
        .bind(customer_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_reservation).collect()
    }

    /// Check stock and insert a PENDING reservation in one transaction
    pub async fn reservations_insert(&self, draft: &NewReservation, now: DateTime<Utc>) -> AppResult<ReservationDetails> {
        let mut tx = self.pool.begin().await?;

        let demands = aggregate_demand(
            draft
                .line_items
                .iter()
                .map(|li| (li.resource_id, li.quantity, li.window(draft.start_time))),
        );
        let ids: Vec<i32> = demands.iter().map(|d| d.resource_id).collect();
        let resources = self.resources_lock(&mut tx, &ids).await?;
        self.verify_demands(&mut tx, &resources, &demands, None).await?;

        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            INSERT INTO reservations (
                customer_id, site_id, status, start_time, estimated_end_time,
                subtotal, discount, tax, deposit, penalty, adjustments_total, total,
                amount_due_now, amount_paid, balance_due, is_advance, coupon_code,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, $10, $11, 0, $10, $12, $13, 1, $14, $14)
            RETURNING *
            "#,
        )
        .bind(draft.customer_id)
        .bind(draft.site_id)
        .bind(ReservationStatus::Pending.as_str())
        .bind(draft.start_time)
        .bind(draft.estimated_end_time)
        .bind(draft.subtotal)
        .bind(draft.discount)
        .bind(draft.tax)
        .bind(draft.deposit)
        .bind(draft.total)
        .bind(draft.amount_due_now)
        .bind(draft.is_advance)
        .bind(&draft.coupon_code)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_or_persistence)?;

        let mut line_items = Vec::with_capacity(draft.line_items.len());
        for li in &draft.line_items {
            let item = sqlx::query_as::<_, LineItem>(
                r#"
                INSERT INTO line_items (reservation_id, resource_id, quantity, hours, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, reservation_id, resource_id, quantity, hours, unit_price
                "#,
            )
            .bind(row.id)
            .bind(li.resource_id)
            .bind(li.quantity)
            .bind(li.hours)
            .bind(li.unit_price)
            .fetch_one(&mut *tx)
            .await
            .map_err(conflict_or_persistence)?;
            line_items.push(item);
        }

        tx.commit().await.map_err(conflict_or_persistence)?;

        Ok(ReservationDetails {
            reservation: into_reservation(row)?,
            line_items,
            adjustments: Vec::new(),
        })
    }

    /// Apply a planned lifecycle write in one transaction
    pub async fn reservations_apply_update(
        &self,
        update: &ReservationUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<ReservationDetails> {
        let next = &update.reservation;
        let mut tx = self.pool.begin().await?;

        if update.recheck_stock || !update.repair_moves.is_empty() {
            let line_items = self.reservations_line_items(&mut *tx, next.id).await?;
            let ids: Vec<i32> = line_items.iter().map(|li| li.resource_id).collect();
            let resources = self.resources_lock(&mut tx, &ids).await?;

            if update.recheck_stock {
                let demands = aggregate_demand(line_items.iter().map(|li| {
                    (
                        li.resource_id,
                        li.quantity,
                        TimeWindow::new(next.start_time, next.start_time + Duration::hours(li.hours as i64)),
                    )
                }));
                self.verify_demands(&mut tx, &resources, &demands, Some(next.id)).await?;
            }
        }

        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            UPDATE reservations SET
                seller_id = $3,
                status = $4,
                start_time = $5,
                estimated_end_time = $6,
                delivered_at = $7,
                actual_return_time = $8,
                penalty = $9,
                adjustments_total = $10,
                total = $11,
                amount_paid = $12,
                balance_due = $13,
                payment_method = $14,
                payment_reference = $15,
                updated_at = $16,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(next.id)
        .bind(update.expected_version)
        .bind(next.seller_id)
        .bind(next.status.as_str())
        .bind(next.start_time)
        .bind(next.estimated_end_time)
        .bind(next.delivered_at)
        .bind(next.actual_return_time)
        .bind(next.penalty)
        .bind(next.adjustments_total)
        .bind(next.total)
        .bind(next.amount_paid)
        .bind(next.balance_due)
        .bind(next.payment_method.map(|m| m.as_str()))
        .bind(&next.payment_reference)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conflict_or_persistence)?
        .ok_or_else(|| {
            AppError::ConcurrencyConflict(format!(
                "Reservation {} changed since version {}",
                next.id, update.expected_version
            ))
        })?;

        if let Some(adj) = &update.adjustment {
            sqlx::query(
                r#"
                INSERT INTO adjustments (reservation_id, kind, amount, reason, created_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(next.id)
            .bind(adj.kind.as_str())
            .bind(adj.amount)
            .bind(&adj.reason)
            .bind(adj.created_by)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conflict_or_persistence)?;
        }

        for (resource_id, delta) in &update.repair_moves {
            self.resources_move_repair_units(&mut tx, *resource_id, *delta).await?;
        }

        tx.commit().await.map_err(conflict_or_persistence)?;

        tracing::debug!(reservation_id = row.id, version = row.version, "Reservation updated");
        self.reservations_get_details(row.id).await
    }

    async fn verify_demands(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        resources: &[Resource],
        demands: &[StockDemand],
        exclude: Option<i32>,
    ) -> AppResult<()> {
        for demand in demands {
            let resource = resources
                .iter()
                .find(|r| r.id == demand.resource_id)
                .ok_or_else(|| AppError::ResourceNotFound(format!("Resource {} not found", demand.resource_id)))?;
            let holdings = self
                .reservations_holdings(&mut **tx, &[demand.resource_id], &demand.window)
                .await?;
            verify_stock(resource, &holdings, demand, exclude)?;
        }
        Ok(())
    }
}
