use redis::AsyncCommands;

use crate::models::job::QueueEntry;

/// Sidekiq's default queue list.
pub const DEFAULT_QUEUE: &str = "queue:default";

/// Redis list shared with the catalog backend's Sidekiq producer.
pub struct JobQueue {
    client: redis::Client,
    key: String,
}

impl JobQueue {
    pub fn new(redis_url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            key: queue_name.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Push an entry the way Sidekiq does (used by tooling and tests).
    pub async fn push(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(entry).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(&self.key, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Block until an entry is available and return its raw payload.
    ///
    /// Producers `LPUSH`, so `BRPOP` yields entries oldest first. The pop
    /// removes the entry from Redis; nothing is re-queued afterwards.
    pub async fn pop(&self) -> Result<String, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        loop {
            let popped: Option<(String, String)> = conn
                .brpop(&self.key, 0.0)
                .await
                .map_err(QueueError::Redis)?;
            if let Some((_, payload)) = popped {
                return Ok(payload);
            }
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Get the current queue depth (pending entries).
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(&self.key).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
