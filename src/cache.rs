use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

/// Redis-backed key/value store holding JSON-encoded values with a TTL.
/// Misses are a distinct error kind so callers can fall through to the
/// database without treating them as failures.
#[derive(Clone)]
pub struct ResultCache {
    pub client: redis::Client,
}

impl ResultCache {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }

    pub async fn set_value<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(value)?;
        let _: () = conn.set_ex(key, payload, ttl.as_secs()).await?;
        Ok(())
    }

    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(key).await?;
        match payload {
            Some(payload) => Ok(serde_json::from_str(&payload)?),
            None => Err(CacheError::Miss),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: usize = conn.del(key).await?;
        Ok(())
    }
}
