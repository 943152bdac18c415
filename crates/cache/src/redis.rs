//! Redis-backed key-value client (optional).
//!
//! Enabled with the `redis` cargo feature. One multiplexed connection is
//! opened per call; connection pooling can be layered on later if the cache
//! becomes hot enough to matter.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::client::{KeyValueClient, KvError};

/// Redis client for the cache adapter.
#[derive(Debug, Clone)]
pub struct RedisKvClient {
    client: redis::Client,
}

impl RedisKvClient {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, KvError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}

#[async_trait]
impl KeyValueClient for RedisKvClient {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.connection().await?;
        conn.get(key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        conn.set(key, value)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn psetex(&self, key: &str, ttl_ms: u64, value: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        conn.pset_ex(key, value, ttl_ms)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        conn.del(key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn flushall(&self) -> Result<(), KvError> {
        let mut conn = self.connection().await?;
        redis::cmd("FLUSHALL")
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}
