#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use trailbot::cache::{set_json, MarketCache, MemoryCache, SYMBOLS_NAMESPACE};
use trailbot::exchange::{ExchangeClient, ExchangeError, ExchangeResult};
use trailbot::lock::{CacheLockManager, SymbolLockManager};
use trailbot::notify::AlertSink;
use trailbot::settings::{
    BuySettings, CandleSettings, FeatureToggle, SellSettings, StaticConfiguration,
    StrategyOptions, SymbolConfiguration, TradingSettings,
};
use trailbot::{
    AccountInfo, Balance, Candle, IndicatorSnapshot, Order, OrderRequest, OrderStatus, OrderType,
    Services, SymbolInfo, Trader, Trend,
};

#[derive(Default)]
pub struct FakeExchange {
    pub account: Mutex<AccountInfo>,
    pub open_orders: Mutex<Vec<Order>>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub fail_open_orders: Mutex<Option<ExchangeError>>,
    pub fail_account: Mutex<Option<ExchangeError>>,
}

#[async_trait]
impl ExchangeClient for FakeExchange {
    async fn fetch_candles(&self, _symbol: &str, _interval: &str, _limit: u32) -> ExchangeResult<Vec<Candle>> {
        Ok(vec![])
    }

    async fn fetch_open_orders(&self, _symbol: &str) -> ExchangeResult<Vec<Order>> {
        if let Some(err) = self.fail_open_orders.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.open_orders.lock().unwrap().clone())
    }

    async fn fetch_order(&self, _symbol: &str, _order_id: u64) -> ExchangeResult<Order> {
        Err(ExchangeError::from_api(-2013, "Order does not exist."))
    }

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let mut placed = self.placed.lock().unwrap();
        placed.push(request.clone());
        Ok(Order {
            order_id: 500 + placed.len() as u64,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: OrderType::StopLossLimit,
            status: OrderStatus::New,
            price: request.price.parse().unwrap(),
            stop_price: request.stop_price.as_deref().unwrap_or("0").parse().unwrap(),
            orig_qty: request.quantity.parse().unwrap(),
            executed_qty: 0.0,
            cummulative_quote_qty: 0.0,
            time: Utc::now().timestamp_millis(),
            current_price: None,
            updated_at: None,
            limit_price: None,
            limit_percentage: None,
            difference_to_execute: None,
            difference_to_cancel: None,
            minimum_profit: None,
            minimum_profit_percentage: None,
        })
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: u64) -> ExchangeResult<()> {
        Ok(())
    }

    async fn fetch_account_info(&self) -> ExchangeResult<AccountInfo> {
        if let Some(err) = self.fail_account.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.account.lock().unwrap().clone())
    }

    async fn fetch_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo> {
        Ok(SymbolInfo {
            symbol: symbol.to_string(),
            status: "TRADING".to_string(),
            base_asset: symbol.trim_end_matches("USDT").to_string(),
            quote_asset: "USDT".to_string(),
            tick_size: 0.01,
            step_size: 0.00001,
            min_qty: 0.00001,
            min_notional: 10.0,
        })
    }
}

/// Lock manager that counts calls on top of the cache-backed one
pub struct CountingLocks {
    inner: CacheLockManager,
    pub is_locked_calls: Mutex<usize>,
    pub lock_calls: Mutex<usize>,
    pub unlock_calls: Mutex<usize>,
}

impl CountingLocks {
    pub fn new(cache: Arc<dyn MarketCache>) -> Self {
        Self {
            inner: CacheLockManager::new(cache, Duration::from_secs(60)),
            is_locked_calls: Mutex::new(0),
            lock_calls: Mutex::new(0),
            unlock_calls: Mutex::new(0),
        }
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            *self.is_locked_calls.lock().unwrap(),
            *self.lock_calls.lock().unwrap(),
            *self.unlock_calls.lock().unwrap(),
        )
    }
}

#[async_trait]
impl SymbolLockManager for CountingLocks {
    async fn is_locked(&self, symbol: &str) -> trailbot::Result<bool> {
        *self.is_locked_calls.lock().unwrap() += 1;
        self.inner.is_locked(symbol).await
    }

    async fn lock(&self, symbol: &str) -> trailbot::Result<bool> {
        *self.lock_calls.lock().unwrap() += 1;
        self.inner.lock(symbol).await
    }

    async fn unlock(&self, symbol: &str) -> trailbot::Result<bool> {
        *self.unlock_calls.lock().unwrap() += 1;
        self.inner.unlock(symbol).await
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn trading_settings(symbols: &[&str], symbol_lock: bool) -> TradingSettings {
    TradingSettings {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        feature_toggle: FeatureToggle {
            symbol_lock,
            flags: Default::default(),
        },
        defaults: SymbolConfiguration {
            candles: CandleSettings {
                interval: "1d".to_string(),
                limit: 10,
            },
            buy: BuySettings {
                enabled: true,
                trigger_percentage: 1.0,
                stop_percentage: 1.02,
                limit_percentage: 1.021,
                max_purchase_amount: 100.0,
            },
            sell: SellSettings {
                enabled: true,
                trigger_percentage: 1.06,
                stop_percentage: 0.99,
                limit_percentage: 0.989,
            },
            strategy_options: StrategyOptions::default(),
        },
        overrides: HashMap::new(),
    }
}

pub fn account(balances: &[(&str, f64)]) -> AccountInfo {
    AccountInfo {
        can_trade: true,
        update_time: 0,
        balances: balances
            .iter()
            .map(|(asset, free)| Balance {
                asset: asset.to_string(),
                free: *free,
                locked: 0.0,
            })
            .collect(),
    }
}

pub async fn seed_market(cache: &dyn MarketCache, symbol: &str, lowest_price: f64, close: f64) {
    let snapshot = IndicatorSnapshot {
        lowest_price,
        highest_price: lowest_price.max(close) * 1.2,
        trend: Trend::Up,
        trend_diff: 1.5,
    };
    let candle = Candle {
        symbol: symbol.to_string(),
        open_time: Utc::now(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    };
    set_json(cache, SYMBOLS_NAMESPACE, &format!("{}-indicator-data", symbol), &snapshot)
        .await
        .unwrap();
    set_json(cache, SYMBOLS_NAMESPACE, &format!("{}-latest-candle", symbol), &candle)
        .await
        .unwrap();
}

pub struct Harness {
    pub exchange: Arc<FakeExchange>,
    pub cache: Arc<MemoryCache>,
    pub locks: Arc<CountingLocks>,
    pub alerts: Arc<RecordingAlerts>,
    pub trader: Trader,
}

impl Harness {
    pub fn new(settings: TradingSettings, account: AccountInfo) -> Self {
        let exchange = Arc::new(FakeExchange::default());
        *exchange.account.lock().unwrap() = account;
        let cache = Arc::new(MemoryCache::new());
        let locks = Arc::new(CountingLocks::new(cache.clone()));
        let alerts = Arc::new(RecordingAlerts::default());

        let services = Services {
            exchange: exchange.clone(),
            cache: cache.clone(),
            configuration: Arc::new(StaticConfiguration::new(settings)),
        };
        let trader = Trader::new(services, locks.clone(), alerts.clone());

        Self {
            exchange,
            cache,
            locks,
            alerts,
            trader,
        }
    }

    pub async fn persisted(&self, symbol: &str) -> Option<serde_json::Value> {
        trailbot::cache::get_json(self.cache.as_ref(), SYMBOLS_NAMESPACE, &format!("{}-data", symbol))
            .await
            .unwrap()
    }
}
