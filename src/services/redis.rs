//! Redis service for mirroring change notifications to other processes

use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
    channel: String,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str, channel: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            client,
            channel: channel.to_string(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a payload on the change channel; returns the number of subscribers reached
    pub async fn publish(&self, payload: &str) -> AppResult<i64> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))?;

        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to publish to Redis: {}", e)))?;

        Ok(receivers)
    }
}
