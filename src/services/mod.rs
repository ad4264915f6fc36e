//! Business logic services

pub mod cache;
pub mod catalog;
pub mod notifier;
pub mod payments;
pub mod redis;
pub mod reservations;

use std::{sync::Arc, time::Duration};

use crate::{config::AppConfig, engine::QuoteSettings, repository::ReservationStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub reservations: reservations::ReservationService,
    pub notifier: notifier::ChangeNotifier,
    pub cache: Arc<cache::ReadCache>,
}

impl Services {
    /// Wire services around a store and a payment gateway.
    ///
    /// Must be called inside a Tokio runtime: it spawns the cache invalidator.
    pub fn new(
        store: Arc<dyn ReservationStore>,
        payments: Arc<dyn payments::PaymentGateway>,
        config: &AppConfig,
        redis: Option<redis::RedisService>,
    ) -> Self {
        let notifier = notifier::ChangeNotifier::new(redis);
        let cache = Arc::new(cache::ReadCache::new(Duration::from_millis(config.cache.ttl_ms)));
        cache.spawn_invalidator(&notifier);

        Self {
            catalog: catalog::CatalogService::new(store.clone(), cache.clone(), QuoteSettings::from_config(config)),
            reservations: reservations::ReservationService::new(store, payments, notifier.clone(), config),
            notifier,
            cache,
        }
    }
}
