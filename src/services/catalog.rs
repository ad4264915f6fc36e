//! Catalog, advisory availability and quote preview
//!
//! All reads here go through the [`ReadCache`]. Numbers shown to a customer
//! may be up to one TTL old; the booking path re-checks under lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::cache::ReadCache;
use crate::{
    engine::{availability, quote, QuoteSettings, TimeWindow},
    error::{AppError, AppResult},
    models::{
        quote::{QuoteRequest, MAX_LINE_HOURS, MAX_LINE_QUANTITY},
        resource::AvailabilityView, CartLine, PricedLine, Promotion, Quote, RequestContext,
        Resource, Site,
    },
    repository::ReservationStore,
};

/// Resolve cart lines against the catalog, capturing current unit prices
pub fn price_lines(lines: &[CartLine], resources: &[Resource]) -> AppResult<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(AppError::Validation("Cart must not be empty".to_string()));
    }

    lines
        .iter()
        .map(|line| {
            if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) || !(1..=MAX_LINE_HOURS).contains(&line.hours) {
                return Err(AppError::Validation(format!(
                    "Resource {}: quantity must be 1..={} and hours 1..={}",
                    line.resource_id, MAX_LINE_QUANTITY, MAX_LINE_HOURS
                )));
            }
            let resource = resources
                .iter()
                .find(|r| r.id == line.resource_id && r.active)
                .ok_or_else(|| {
                    AppError::ResourceNotFound(format!("Resource {} is not available for rental", line.resource_id))
                })?;
            Ok(PricedLine {
                resource_id: resource.id,
                category_id: resource.category_id,
                quantity: line.quantity,
                hours: line.hours,
                unit_price: resource.price_per_hour,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ReservationStore>,
    cache: Arc<ReadCache>,
    settings: QuoteSettings,
}

impl CatalogService {
    pub fn new(store: Arc<dyn ReservationStore>, cache: Arc<ReadCache>, settings: QuoteSettings) -> Self {
        Self { store, cache, settings }
    }

    /// List all resources
    pub async fn list_resources(&self) -> AppResult<Vec<Resource>> {
        if let Some(resources) = self.cache.resources().await {
            return Ok(resources);
        }
        let resources = self.store.list_resources().await?;
        self.cache.store_resources(resources.clone()).await;
        Ok(resources)
    }

    pub async fn get_resource(&self, id: i32) -> AppResult<Resource> {
        self.list_resources()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::ResourceNotFound(format!("Resource {} not found", id)))
    }

    /// List all sites with opening hours
    pub async fn list_sites(&self) -> AppResult<Vec<Site>> {
        if let Some(sites) = self.cache.sites().await {
            return Ok(sites);
        }
        let sites = self.store.list_sites().await?;
        self.cache.store_sites(sites.clone()).await;
        Ok(sites)
    }

    pub async fn promotions(&self) -> AppResult<Vec<Promotion>> {
        if let Some(promotions) = self.cache.promotions().await {
            return Ok(promotions);
        }
        let promotions = self.store.active_promotions().await?;
        self.cache.store_promotions(promotions.clone()).await;
        Ok(promotions)
    }

    /// Free units of a resource over `[start, end)`, for display only
    pub async fn availability(
        &self,
        resource_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<AvailabilityView> {
        let window = TimeWindow::new(start, end);
        if !window.is_valid() {
            return Err(AppError::Validation("End time must be after start time".to_string()));
        }

        let available_units = match self.cache.availability(resource_id, start, end).await {
            Some(units) => units,
            None => {
                let resource = self.store.get_resource(resource_id).await?;
                let holdings = self.store.holdings(resource_id, &window).await?;
                let units = availability::available_units(&resource, &holdings, &window, None)?;
                self.cache.store_availability(resource_id, start, end, units).await;
                units
            }
        };

        Ok(AvailabilityView {
            resource_id,
            start_time: start,
            end_time: end,
            available_units,
        })
    }

    /// Price a cart without booking anything
    pub async fn quote(&self, request: &QuoteRequest, ctx: &RequestContext) -> AppResult<Quote> {
        let resources = self.list_resources().await?;
        let lines = price_lines(&request.lines, &resources)?;
        let promotions = self.promotions().await?;

        let quote = quote::compute_quote(
            &lines,
            &promotions,
            request.coupon_code.as_deref(),
            request.start_time,
            ctx.now,
            &self.settings,
        );
        tracing::debug!(request_id = %ctx.request_id, total = %quote.total, "Quote computed");
        Ok(quote)
    }
}
