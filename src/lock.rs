//! Advisory per-symbol locks
//!
//! A lock only deters a second concurrent decision run for the same symbol.
//! It never guards producer/consumer access to the cache and never blocks
//! the holder's own exchange calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cache::{keys, MarketCache, SYMBOLS_NAMESPACE};
use crate::Result;

/// Query/acquire/release surface used by the decision cycle
#[async_trait]
pub trait SymbolLockManager: Send + Sync {
    async fn is_locked(&self, symbol: &str) -> Result<bool>;

    /// Returns false when another run already holds the lock
    async fn lock(&self, symbol: &str) -> Result<bool>;

    /// Returns whether a lock entry was removed
    async fn unlock(&self, symbol: &str) -> Result<bool>;
}

/// Locks stored as expiring entries in the market cache
pub struct CacheLockManager {
    cache: Arc<dyn MarketCache>,
    ttl: Duration,
}

impl CacheLockManager {
    pub fn new(cache: Arc<dyn MarketCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait]
impl SymbolLockManager for CacheLockManager {
    async fn is_locked(&self, symbol: &str) -> Result<bool> {
        Ok(self.cache.exists(SYMBOLS_NAMESPACE, &keys::lock(symbol)).await?)
    }

    async fn lock(&self, symbol: &str) -> Result<bool> {
        let acquired = self
            .cache
            .set_if_absent(SYMBOLS_NAMESPACE, &keys::lock(symbol), "true", self.ttl)
            .await?;
        debug!(symbol = %symbol, acquired, "Lock symbol");
        Ok(acquired)
    }

    async fn unlock(&self, symbol: &str) -> Result<bool> {
        let removed = self.cache.delete(SYMBOLS_NAMESPACE, &keys::lock(symbol)).await?;
        debug!(symbol = %symbol, removed, "Unlock symbol");
        Ok(removed)
    }
}

/// Lock held for the duration of one pipeline run
///
/// Call [`SymbolLockGuard::release`] on every normal exit. If the guard is
/// dropped without it (panic, cancelled future) the unlock is spawned onto
/// the current runtime instead.
pub struct SymbolLockGuard {
    manager: Arc<dyn SymbolLockManager>,
    symbol: String,
    released: bool,
}

impl SymbolLockGuard {
    /// Try to take the lock; `None` when someone else holds it
    pub async fn acquire(
        manager: Arc<dyn SymbolLockManager>,
        symbol: &str,
    ) -> Result<Option<Self>> {
        if !manager.lock(symbol).await? {
            return Ok(None);
        }

        Ok(Some(Self {
            manager,
            symbol: symbol.to_string(),
            released: false,
        }))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.manager.unlock(&self.symbol).await?;
        Ok(())
    }
}

impl Drop for SymbolLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let manager = self.manager.clone();
        let symbol = std::mem::take(&mut self.symbol);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = manager.unlock(&symbol).await {
                        warn!(symbol = %symbol, "Failed to release dropped lock: {}", e);
                    }
                });
            }
            Err(_) => warn!(symbol = %symbol, "Lock dropped outside a runtime, left to expire"),
        }
    }
}
