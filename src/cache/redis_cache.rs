use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ExistenceCheck, SetExpiry, SetOptions};
use tokio::time::timeout;

use super::{CacheError, MarketCache};

/// Redis-backed market cache
///
/// Entries live under plain string keys `"{namespace}:{key}"` so a lock entry
/// can carry its own expiry.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout)??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{}:{}", namespace, key)
    }
}

#[async_trait]
impl MarketCache for RedisCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::full_key(namespace, key)).await?;
        Ok(value)
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::full_key(namespace, key), value)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(ttl.as_secs().max(1) as _));

        // SET NX replies OK when written and nil when the key already exists
        let reply: Option<String> = conn
            .set_options(Self::full_key(namespace, key), value, options)
            .await?;
        Ok(reply.is_some())
    }

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::full_key(namespace, key)).await?;
        Ok(exists)
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(Self::full_key(namespace, key)).await?;
        Ok(removed > 0)
    }
}
