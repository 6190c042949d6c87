use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheError, MarketCache};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-process cache
///
/// Used for dry runs and tests; clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryCache {
    data: Arc<RwLock<HashMap<(String, String), Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored in a namespace, expired entries excluded
    pub fn keys(&self, namespace: &str) -> Result<Vec<String>, CacheError> {
        let data = self.data.read().map_err(|e| CacheError::Poisoned(e.to_string()))?;
        let now = Instant::now();

        let mut keys: Vec<String> = data
            .iter()
            .filter(|((ns, _), entry)| ns == namespace && entry.is_live(now))
            .map(|((_, key), _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl MarketCache for MemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError> {
        let data = self.data.read().map_err(|e| CacheError::Poisoned(e.to_string()))?;

        Ok(data
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), CacheError> {
        let mut data = self.data.write().map_err(|e| CacheError::Poisoned(e.to_string()))?;

        data.insert(
            (namespace.to_string(), key.to_string()),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut data = self.data.write().map_err(|e| CacheError::Poisoned(e.to_string()))?;
        let now = Instant::now();
        let slot = (namespace.to_string(), key.to_string());

        if data.get(&slot).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        data.insert(
            slot,
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError> {
        let mut data = self.data.write().map_err(|e| CacheError::Poisoned(e.to_string()))?;

        Ok(data
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some_and(|entry| entry.is_live(Instant::now())))
    }
}
