//! Decision cycle: one pipeline run per configured symbol

use std::sync::Arc;

use tracing::{info, warn};

use crate::lock::{SymbolLockGuard, SymbolLockManager};
use crate::models::AccountInfo;
use crate::notify::{report_failure, AlertSink};
use crate::pipeline::{Pipeline, Services, SymbolContext};
use crate::settings::FeatureToggle;
use crate::{Error, Result};

/// How one symbol's run ended
#[derive(Debug)]
pub enum SymbolOutcome {
    Completed(Box<SymbolContext>),
    Failed { retryable: bool, message: String },
}

#[derive(Debug)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Per-symbol results of one decision cycle
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub symbols: Vec<SymbolReport>,
}

impl CycleSummary {
    pub fn context(&self, symbol: &str) -> Option<&SymbolContext> {
        self.symbols.iter().find_map(|report| match &report.outcome {
            SymbolOutcome::Completed(ctx) if report.symbol == symbol => Some(ctx.as_ref()),
            _ => None,
        })
    }

    pub fn failures(&self) -> usize {
        self.symbols
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Failed { .. }))
            .count()
    }
}

pub struct Trader {
    services: Services,
    locks: Arc<dyn SymbolLockManager>,
    alerts: Arc<dyn AlertSink>,
    pipeline: Pipeline,
}

impl Trader {
    pub fn new(services: Services, locks: Arc<dyn SymbolLockManager>, alerts: Arc<dyn AlertSink>) -> Self {
        Self::with_pipeline(services, locks, alerts, Pipeline::standard())
    }

    pub fn with_pipeline(
        services: Services,
        locks: Arc<dyn SymbolLockManager>,
        alerts: Arc<dyn AlertSink>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            services,
            locks,
            alerts,
            pipeline,
        }
    }

    /// Run every configured symbol once
    ///
    /// Never fails: errors are classified and reported per symbol, and a
    /// failure before the symbol loop ends the cycle early.
    pub async fn execute_decision_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let global = match self.services.configuration.global_configuration().await {
            Ok(global) => global,
            Err(e) => {
                report_failure(self.alerts.as_ref(), "global-configuration", &e).await;
                return summary;
            }
        };

        let account = match self.services.exchange.fetch_account_info().await {
            Ok(account) => account,
            Err(e) => {
                report_failure(self.alerts.as_ref(), "account-info", &Error::from(e)).await;
                return summary;
            }
        };

        for symbol in &global.symbols {
            let outcome = match self.run_symbol(symbol, &global.feature_toggle, &account).await {
                Ok(ctx) => SymbolOutcome::Completed(Box::new(ctx)),
                Err(e) => {
                    report_failure(self.alerts.as_ref(), symbol, &e).await;
                    SymbolOutcome::Failed {
                        retryable: e.is_retryable(),
                        message: e.to_string(),
                    }
                }
            };
            summary.symbols.push(SymbolReport {
                symbol: symbol.clone(),
                outcome,
            });
        }

        info!(
            symbols = summary.symbols.len(),
            failures = summary.failures(),
            "Decision cycle complete"
        );
        summary
    }

    async fn run_symbol(
        &self,
        symbol: &str,
        feature_toggle: &FeatureToggle,
        account: &AccountInfo,
    ) -> Result<SymbolContext> {
        let mut is_locked = self.locks.is_locked(symbol).await?;

        let guard = if feature_toggle.symbol_lock && !is_locked {
            let guard = SymbolLockGuard::acquire(self.locks.clone(), symbol).await?;
            // Another run took it between the check and the acquire
            is_locked = guard.is_none();
            guard
        } else {
            None
        };

        let ctx = SymbolContext::new(symbol, is_locked, feature_toggle.clone(), account.clone());
        let result = self.pipeline.run(&self.services, ctx).await;

        if let Some(guard) = guard {
            if let Err(e) = guard.release().await {
                warn!(symbol = %symbol, "Failed to release lock: {}", e);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{get_json, keys, MemoryCache, SYMBOLS_NAMESPACE};
    use crate::notify::LogNotifier;
    use crate::pipeline::testing::*;
    use crate::pipeline::{Action, WaitReason};
    use crate::settings::StaticConfiguration;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Lock that looks free but is taken by someone else before we get it
    #[derive(Default)]
    struct LostRace {
        unlocks: Mutex<usize>,
    }

    #[async_trait]
    impl SymbolLockManager for LostRace {
        async fn is_locked(&self, _symbol: &str) -> Result<bool> {
            Ok(false)
        }

        async fn lock(&self, _symbol: &str) -> Result<bool> {
            Ok(false)
        }

        async fn unlock(&self, _symbol: &str) -> Result<bool> {
            *self.unlocks.lock().unwrap() += 1;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_lost_lock_race_runs_as_locked() {
        let exchange = Arc::new(MockExchange::with_state(MockState {
            account: account(0.0, 1000.0),
            symbol_info: Some(btc_info()),
            ..Default::default()
        }));
        let cache = Arc::new(MemoryCache::new());
        // At the buy trigger, so only the lock holds the order back
        seed_market(cache.as_ref(), 100.0, 99.0).await;

        let mut settings = trading_settings();
        settings.feature_toggle.symbol_lock = true;
        let services = Services {
            exchange: exchange.clone(),
            cache: cache.clone(),
            configuration: Arc::new(StaticConfiguration::new(settings)),
        };
        let locks = Arc::new(LostRace::default());
        let trader = Trader::new(services, locks.clone(), Arc::new(LogNotifier));

        let summary = trader.execute_decision_cycle().await;

        let ctx = summary.context("BTCUSDT").unwrap();
        assert!(ctx.is_locked);
        assert_eq!(ctx.action, Action::Wait(WaitReason::SymbolLocked));
        assert!(exchange.state.lock().unwrap().placed.is_empty());
        assert_eq!(*locks.unlocks.lock().unwrap(), 0);

        let persisted: serde_json::Value = get_json(cache.as_ref(), SYMBOLS_NAMESPACE, &keys::context("BTCUSDT"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted["isLocked"], true);
    }
}
