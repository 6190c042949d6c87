// Market cache: the only state shared between the indicator producer and the
// decision pipeline
pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

/// Namespace holding every per-symbol entry
pub const SYMBOLS_NAMESPACE: &str = "trailing-trade-symbols";

/// Per-symbol keys inside [`SYMBOLS_NAMESPACE`]
pub mod keys {
    pub fn indicator_data(symbol: &str) -> String {
        format!("{}-indicator-data", symbol)
    }

    pub fn latest_candle(symbol: &str) -> String {
        format!("{}-latest-candle", symbol)
    }

    pub fn last_buy_price(symbol: &str) -> String {
        format!("{}-last-buy-price", symbol)
    }

    pub fn lock(symbol: &str) -> String {
        format!("{}-lock", symbol)
    }

    pub fn symbol_info(symbol: &str) -> String {
        format!("{}-symbol-info", symbol)
    }

    pub fn context(symbol: &str) -> String {
        format!("{}-data", symbol)
    }

    pub fn last_buy_order(symbol: &str) -> String {
        format!("{}-last-buy-order", symbol)
    }

    pub fn last_sell_order(symbol: &str) -> String {
        format!("{}-last-sell-order", symbol)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache connection timed out")]
    Timeout,

    #[error("cache state poisoned: {0}")]
    Poisoned(String),
}

/// Key/value store with JSON string values
#[async_trait]
pub trait MarketCache: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), CacheError>;

    /// Store only if absent; returns whether the value was written
    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, CacheError>;

    /// Returns whether something was removed
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, CacheError>;
}

/// Read and decode a JSON entry. An empty string or JSON `null` counts as
/// absent.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn MarketCache,
    namespace: &str,
    key: &str,
) -> crate::Result<Option<T>> {
    match cache.get(namespace, key).await? {
        Some(raw) if !raw.trim().is_empty() && raw.trim() != "null" => {
            Ok(Some(serde_json::from_str(&raw)?))
        }
        _ => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn MarketCache,
    namespace: &str,
    key: &str,
    value: &T,
) -> crate::Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(namespace, key, &raw).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorSnapshot, Trend};

    #[tokio::test]
    async fn test_json_helpers_round_trip_snapshot() {
        let cache = MemoryCache::new();
        let snapshot = IndicatorSnapshot {
            lowest_price: 100.0,
            highest_price: 120.0,
            trend: Trend::Up,
            trend_diff: 3.25,
        };

        set_json(&cache, SYMBOLS_NAMESPACE, &keys::indicator_data("BTCUSDT"), &snapshot)
            .await
            .unwrap();

        let loaded: Option<IndicatorSnapshot> =
            get_json(&cache, SYMBOLS_NAMESPACE, &keys::indicator_data("BTCUSDT"))
                .await
                .unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn test_get_json_treats_null_as_absent() {
        let cache = MemoryCache::new();
        cache
            .set(SYMBOLS_NAMESPACE, &keys::latest_candle("BTCUSDT"), "null")
            .await
            .unwrap();

        let loaded: Option<IndicatorSnapshot> =
            get_json(&cache, SYMBOLS_NAMESPACE, &keys::latest_candle("BTCUSDT"))
                .await
                .unwrap();
        assert!(loaded.is_none());
    }
}
