//! Thin typed wrapper over a Redis connection manager.
//!
//! Every command logs its outcome; failures are returned to the caller rather
//! than swallowed so binaries can decide whether to continue.

use std::collections::HashMap;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use herald_common::error::Result;

/// Redis-backed store for plain string keys and hashes.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// `SET key value`.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let reply: String = conn.set(key, value).await?;

        tracing::info!(key, reply = %reply, "Value set");
        Ok(())
    }

    /// `GET key`. Missing keys are `None`.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await?;

        tracing::debug!(key, found = value.is_some(), "Value read");
        Ok(value)
    }

    /// Set several fields of a hash in one command.
    pub async fn hash_set<F, V>(&self, key: &str, fields: &[(F, V)]) -> Result<()>
    where
        F: redis::ToRedisArgs + Send + Sync,
        V: redis::ToRedisArgs + Send + Sync,
    {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields).await?;

        tracing::info!(key, fields = fields.len(), "Hash updated");
        Ok(())
    }

    /// `HGETALL key`. A missing hash reads as an empty map.
    pub async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.redis.clone();
        let data: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(data)
    }
}
