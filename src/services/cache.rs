//! Short-lived read cache for catalog and advisory availability
//!
//! Entries expire after the configured TTL and are dropped early whenever a
//! reservation change is broadcast. Nothing on the booking path reads from
//! here: stock decisions always go to the store under its lock.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};
use tokio_stream::StreamExt;

use super::notifier::ChangeNotifier;
use crate::models::{Promotion, Resource, Site};

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    stored_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

type AvailabilityKey = (i32, DateTime<Utc>, DateTime<Utc>);

pub struct ReadCache {
    ttl: Duration,
    resources: RwLock<Option<Cached<Vec<Resource>>>>,
    sites: RwLock<Option<Cached<Vec<Site>>>>,
    promotions: RwLock<Option<Cached<Vec<Promotion>>>>,
    availability: RwLock<HashMap<AvailabilityKey, Cached<i32>>>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            resources: RwLock::new(None),
            sites: RwLock::new(None),
            promotions: RwLock::new(None),
            availability: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resources(&self) -> Option<Vec<Resource>> {
        self.resources.read().await.as_ref().and_then(|c| c.fresh(self.ttl))
    }

    pub async fn store_resources(&self, value: Vec<Resource>) {
        *self.resources.write().await = Some(Cached::new(value));
    }

    pub async fn sites(&self) -> Option<Vec<Site>> {
        self.sites.read().await.as_ref().and_then(|c| c.fresh(self.ttl))
    }

    pub async fn store_sites(&self, value: Vec<Site>) {
        *self.sites.write().await = Some(Cached::new(value));
    }

    pub async fn promotions(&self) -> Option<Vec<Promotion>> {
        self.promotions.read().await.as_ref().and_then(|c| c.fresh(self.ttl))
    }

    pub async fn store_promotions(&self, value: Vec<Promotion>) {
        *self.promotions.write().await = Some(Cached::new(value));
    }

    pub async fn availability(&self, resource_id: i32, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<i32> {
        self.availability
            .read()
            .await
            .get(&(resource_id, start, end))
            .and_then(|c| c.fresh(self.ttl))
    }

    pub async fn store_availability(&self, resource_id: i32, start: DateTime<Utc>, end: DateTime<Utc>, units: i32) {
        let mut map = self.availability.write().await;
        map.retain(|_, c| c.stored_at.elapsed() < self.ttl);
        map.insert((resource_id, start, end), Cached::new(units));
    }

    /// Drop availability entries for the given resources
    pub async fn invalidate_resources(&self, resource_ids: &[i32]) {
        self.availability
            .write()
            .await
            .retain(|(id, _, _), _| !resource_ids.contains(id));
        // units_in_repair lives on the resource rows
        *self.resources.write().await = None;
    }

    pub async fn invalidate_all(&self) {
        *self.resources.write().await = None;
        *self.sites.write().await = None;
        *self.promotions.write().await = None;
        self.availability.write().await.clear();
    }

    /// Keep the cache in step with committed changes
    pub fn spawn_invalidator(self: &Arc<Self>, notifier: &ChangeNotifier) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut events = notifier.stream();
        tokio::spawn(async move {
            while let Some(next) = events.next().await {
                match next {
                    Ok(event) => cache.invalidate_resources(&event.resource_ids).await,
                    Err(lagged) => {
                        tracing::debug!("Cache invalidator lagged: {}", lagged);
                        cache.invalidate_all().await;
                    }
                }
            }
        })
    }
}
