//! Promotion methods on Repository

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{promotion::PromotionRow, Promotion},
};

impl Repository {
    /// Active promotions in id order
    pub async fn promotions_active(&self) -> AppResult<Vec<Promotion>> {
        let rows = sqlx::query_as::<_, PromotionRow>(
            r#"
            SELECT id, name, kind, automatic, coupon_code, resource_id, category_id,
                   threshold, benefit, value, active
            FROM promotions
            WHERE active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                Promotion::try_from(row)
                    .map_err(|e| AppError::Internal(format!("Promotion {} is malformed: {}", id, e)))
            })
            .collect()
    }
}
