//! Resource catalog methods on Repository

use sqlx::{Postgres, Transaction};

use super::{conflict_or_persistence, Repository};
use crate::{
    error::{AppError, AppResult},
    models::Resource,
};

const RESOURCE_COLUMNS: &str =
    "id, name, category_id, site_id, price_per_hour, total_units, units_in_repair, active";

impl Repository {
    /// List all resources, active or not
    pub async fn resources_list(&self) -> AppResult<Vec<Resource>> {
        let rows = sqlx::query_as::<_, Resource>(&format!(
            "SELECT {} FROM resources ORDER BY id",
            RESOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get resource by ID
    pub async fn resources_get_by_id(&self, id: i32) -> AppResult<Resource> {
        sqlx::query_as::<_, Resource>(&format!("SELECT {} FROM resources WHERE id = $1", RESOURCE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Resource {} not found", id)))
    }

    /// Lock resource rows in ascending id order for the rest of the transaction.
    ///
    /// Every writer that touches stock takes these locks in the same order,
    /// so two bookings sharing resources queue instead of deadlocking.
    pub(crate) async fn resources_lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i32],
    ) -> AppResult<Vec<Resource>> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let rows = sqlx::query_as::<_, Resource>(&format!(
            "SELECT {} FROM resources WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            RESOURCE_COLUMNS
        ))
        .bind(&sorted)
        .fetch_all(&mut **tx)
        .await
        .map_err(conflict_or_persistence)?;

        if let Some(missing) = sorted.iter().find(|id| !rows.iter().any(|r| r.id == **id)) {
            return Err(AppError::ResourceNotFound(format!("Resource {} not found", missing)));
        }
        Ok(rows)
    }

    /// Move units in or out of repair; never below zero
    pub(crate) async fn resources_move_repair_units(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        resource_id: i32,
        delta: i32,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE resources SET units_in_repair = GREATEST(0, units_in_repair + $2) WHERE id = $1",
        )
        .bind(resource_id)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .map_err(conflict_or_persistence)?;
        Ok(())
    }
}
