use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{get_json, keys, set_json, MarketCache, SYMBOLS_NAMESPACE};
use crate::Result;

/// Cost basis of the position currently held for a symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastBuyRecord {
    pub last_buy_price: f64,
    pub quantity: f64,
}

/// Last-buy-price bookkeeping kept in the market cache
#[derive(Clone)]
pub struct LastBuyPriceLedger {
    cache: Arc<dyn MarketCache>,
}

impl LastBuyPriceLedger {
    pub fn new(cache: Arc<dyn MarketCache>) -> Self {
        Self { cache }
    }

    pub async fn get(&self, symbol: &str) -> Result<Option<LastBuyRecord>> {
        get_json(self.cache.as_ref(), SYMBOLS_NAMESPACE, &keys::last_buy_price(symbol)).await
    }

    /// Recorded price, `None` when absent or not positive
    pub async fn last_buy_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self
            .get(symbol)
            .await?
            .map(|record| record.last_buy_price)
            .filter(|price| *price > 0.0))
    }

    /// Average a buy fill into the existing record
    pub async fn record_buy(&self, symbol: &str, price: f64, quantity: f64) -> Result<LastBuyRecord> {
        let record = match self.get(symbol).await? {
            Some(existing) if existing.last_buy_price > 0.0 && existing.quantity > 0.0 => {
                let total_quantity = existing.quantity + quantity;
                let cost = existing.last_buy_price * existing.quantity + price * quantity;
                LastBuyRecord {
                    last_buy_price: cost / total_quantity,
                    quantity: total_quantity,
                }
            }
            _ => LastBuyRecord {
                last_buy_price: price,
                quantity,
            },
        };

        set_json(
            self.cache.as_ref(),
            SYMBOLS_NAMESPACE,
            &keys::last_buy_price(symbol),
            &record,
        )
        .await?;

        info!(
            symbol = %symbol,
            last_buy_price = record.last_buy_price,
            quantity = record.quantity,
            "Recorded last buy price"
        );
        Ok(record)
    }

    pub async fn remove(&self, symbol: &str) -> Result<bool> {
        let removed = self
            .cache
            .delete(SYMBOLS_NAMESPACE, &keys::last_buy_price(symbol))
            .await?;
        if removed {
            info!(symbol = %symbol, "Removed last buy price");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn ledger() -> LastBuyPriceLedger {
        LastBuyPriceLedger::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn test_first_buy_sets_record() {
        let ledger = ledger();
        assert!(ledger.last_buy_price("BTCUSDT").await.unwrap().is_none());

        ledger.record_buy("BTCUSDT", 100.0, 2.0).await.unwrap();
        assert_eq!(ledger.last_buy_price("BTCUSDT").await.unwrap(), Some(100.0));
    }

    #[tokio::test]
    async fn test_second_buy_is_averaged() {
        let ledger = ledger();
        ledger.record_buy("BTCUSDT", 100.0, 1.0).await.unwrap();
        let record = ledger.record_buy("BTCUSDT", 130.0, 2.0).await.unwrap();

        assert_eq!(record.quantity, 3.0);
        assert!((record.last_buy_price - 120.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remove() {
        let ledger = ledger();
        ledger.record_buy("ETHUSDT", 2000.0, 0.5).await.unwrap();

        assert!(ledger.remove("ETHUSDT").await.unwrap());
        assert!(!ledger.remove("ETHUSDT").await.unwrap());
        assert!(ledger.get("ETHUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_price_counts_as_absent() {
        let cache: Arc<dyn MarketCache> = Arc::new(MemoryCache::new());
        cache
            .set(
                SYMBOLS_NAMESPACE,
                &keys::last_buy_price("BTCUSDT"),
                r#"{"lastBuyPrice":0,"quantity":0}"#,
            )
            .await
            .unwrap();

        let ledger = LastBuyPriceLedger::new(cache);
        assert!(ledger.last_buy_price("BTCUSDT").await.unwrap().is_none());
    }
}
