use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::warn;
use cinebook_core::repository::{ReferenceSequence, StoreError, StoreResult};

const REFERENCE_SEQUENCE_KEY: &str = "booking:reference:seq";

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns false once `limit` hits land in the current window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }

    async fn incr_sequence(&self) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.incr(REFERENCE_SEQUENCE_KEY, 1).await
    }
}

/// Shared counter so every API instance draws from the same sequence.
#[async_trait]
impl ReferenceSequence for RedisClient {
    async fn next_value(&self) -> StoreResult<u64> {
        self.incr_sequence().await.map_err(|e| {
            warn!(error = %e, "reference sequence unavailable");
            StoreError::Unavailable(e.to_string())
        })
    }
}
