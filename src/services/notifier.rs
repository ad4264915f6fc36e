//! Reservation change notifications
//!
//! Every committed reservation write is broadcast in-process. Subscribers
//! (the read cache, for one) must tolerate lagging: a lagged receiver should
//! treat its view as stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::redis::RedisService;
use crate::models::{ReservationDetails, ReservationStatus};

const CHANNEL_CAPACITY: usize = 256;

/// A committed change to one reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub reservation_id: i32,
    pub operation: String,
    pub status: ReservationStatus,
    pub resource_ids: Vec<i32>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn from_details(operation: &str, details: &ReservationDetails, at: DateTime<Utc>) -> Self {
        let mut resource_ids: Vec<i32> = details.line_items.iter().map(|li| li.resource_id).collect();
        resource_ids.sort_unstable();
        resource_ids.dedup();
        Self {
            reservation_id: details.reservation.id,
            operation: operation.to_string(),
            status: details.reservation.status,
            resource_ids,
            at,
        }
    }
}

#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
    redis: Option<RedisService>,
}

impl ChangeNotifier {
    pub fn new(redis: Option<RedisService>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, redis }
    }

    pub fn mirrors_to_redis(&self) -> bool {
        self.redis.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<ChangeEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Broadcast an event. Delivery failures are logged, never returned:
    /// the write it describes has already been committed.
    pub async fn publish(&self, event: ChangeEvent) {
        if let Some(redis) = &self.redis {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    if let Err(e) = redis.publish(&payload).await {
                        tracing::warn!(reservation_id = event.reservation_id, "Redis publish failed: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Could not serialize change event: {}", e),
            }
        }

        // No receivers is fine
        let _ = self.sender.send(event);
    }
}
