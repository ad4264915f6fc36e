//! Site and opening hours methods on Repository

use std::collections::HashMap;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{site::SiteRow, Site, SiteHours},
};

impl Repository {
    /// List all sites with their hours
    pub async fn sites_list(&self) -> AppResult<Vec<Site>> {
        let rows = sqlx::query_as::<_, SiteRow>("SELECT id, name FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let hours = sqlx::query_as::<_, SiteHours>(
            "SELECT site_id, day_of_week, open_time, close_time FROM site_hours ORDER BY site_id, day_of_week",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_site: HashMap<i32, Vec<SiteHours>> = HashMap::new();
        for h in hours {
            by_site.entry(h.site_id).or_default().push(h);
        }

        Ok(rows
            .into_iter()
            .map(|row| Site {
                hours: by_site.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    /// Get site by ID
    pub async fn sites_get_by_id(&self, id: i32) -> AppResult<Site> {
        let row = sqlx::query_as::<_, SiteRow>("SELECT id, name FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))?;

        let hours = sqlx::query_as::<_, SiteHours>(
            "SELECT site_id, day_of_week, open_time, close_time FROM site_hours WHERE site_id = $1 ORDER BY day_of_week",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Site {
            id: row.id,
            name: row.name,
            hours,
        })
    }
}
