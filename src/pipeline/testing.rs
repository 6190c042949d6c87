// Fakes and fixtures shared by the step tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::{set_json, keys, MarketCache, MemoryCache, SYMBOLS_NAMESPACE};
use crate::exchange::{ExchangeClient, ExchangeError, ExchangeResult};
use crate::models::{
    AccountInfo, Balance, Candle, IndicatorSnapshot, Order, OrderRequest, OrderSide, OrderStatus,
    OrderType, SymbolInfo, Trend,
};
use crate::pipeline::{Services, SymbolContext};
use crate::settings::{
    BuySettings, CandleSettings, FeatureToggle, SellSettings, StaticConfiguration,
    StrategyOptions, SymbolConfiguration, TradingSettings,
};

#[derive(Default)]
pub struct MockState {
    pub candles: Vec<Candle>,
    pub open_orders: Vec<Order>,
    pub orders: HashMap<u64, Order>,
    pub account: AccountInfo,
    pub symbol_info: Option<SymbolInfo>,
    pub placed: Vec<OrderRequest>,
    pub cancelled: Vec<u64>,
    pub symbol_info_calls: usize,
    pub account_calls: usize,
    pub fail_open_orders: Option<ExchangeError>,
    pub fail_place_order: Option<ExchangeError>,
}

#[derive(Default)]
pub struct MockExchange {
    pub state: Mutex<MockState>,
}

impl MockExchange {
    pub fn with_state(state: MockState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn fetch_candles(&self, _symbol: &str, _interval: &str, limit: u32) -> ExchangeResult<Vec<Candle>> {
        let state = self.state.lock().unwrap();
        let skip = state.candles.len().saturating_sub(limit as usize);
        Ok(state.candles[skip..].to_vec())
    }

    async fn fetch_open_orders(&self, _symbol: &str) -> ExchangeResult<Vec<Order>> {
        let state = self.state.lock().unwrap();
        if let Some(err) = state.fail_open_orders.clone() {
            return Err(err);
        }
        Ok(state.open_orders.clone())
    }

    async fn fetch_order(&self, _symbol: &str, order_id: u64) -> ExchangeResult<Order> {
        let state = self.state.lock().unwrap();
        state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::from_api(-2013, "Order does not exist."))
    }

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_place_order.clone() {
            return Err(err);
        }
        state.placed.push(request.clone());

        let mut order = order(
            1000 + state.placed.len() as u64,
            request.side,
            OrderType::StopLossLimit,
            request.price.parse().unwrap(),
            request
                .stop_price
                .as_deref()
                .map(|p| p.parse().unwrap())
                .unwrap_or_default(),
        );
        order.orig_qty = request.quantity.parse().unwrap();
        Ok(order)
    }

    async fn cancel_order(&self, _symbol: &str, order_id: u64) -> ExchangeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.cancelled.push(order_id);
        state.open_orders.retain(|o| o.order_id != order_id);
        Ok(())
    }

    async fn fetch_account_info(&self) -> ExchangeResult<AccountInfo> {
        let mut state = self.state.lock().unwrap();
        state.account_calls += 1;
        Ok(state.account.clone())
    }

    async fn fetch_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo> {
        let mut state = self.state.lock().unwrap();
        state.symbol_info_calls += 1;
        state
            .symbol_info
            .clone()
            .ok_or_else(|| ExchangeError::from_api(-1121, format!("Invalid symbol {}", symbol)))
    }
}

pub fn btc_info() -> SymbolInfo {
    SymbolInfo {
        symbol: "BTCUSDT".to_string(),
        status: "TRADING".to_string(),
        base_asset: "BTC".to_string(),
        quote_asset: "USDT".to_string(),
        tick_size: 0.01,
        step_size: 0.00001,
        min_qty: 0.00001,
        min_notional: 10.0,
    }
}

pub fn symbol_configuration() -> SymbolConfiguration {
    SymbolConfiguration {
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
    }
}

pub fn trading_settings() -> TradingSettings {
    TradingSettings {
        symbols: vec!["BTCUSDT".to_string()],
        feature_toggle: FeatureToggle::default(),
        defaults: symbol_configuration(),
        overrides: HashMap::new(),
    }
}

pub fn account(btc_free: f64, usdt_free: f64) -> AccountInfo {
    AccountInfo {
        can_trade: true,
        update_time: 0,
        balances: vec![
            Balance {
                asset: "BTC".to_string(),
                free: btc_free,
                locked: 0.0,
            },
            Balance {
                asset: "USDT".to_string(),
                free: usdt_free,
                locked: 0.0,
            },
        ],
    }
}

pub fn candle(close: f64) -> Candle {
    Candle {
        symbol: "BTCUSDT".to_string(),
        open_time: Utc::now(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

pub fn order(order_id: u64, side: OrderSide, order_type: OrderType, price: f64, stop_price: f64) -> Order {
    Order {
        order_id,
        symbol: "BTCUSDT".to_string(),
        side,
        order_type,
        status: OrderStatus::New,
        price,
        stop_price,
        orig_qty: 0.001,
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
    }
}

pub fn services(exchange: Arc<MockExchange>, cache: Arc<MemoryCache>) -> Services {
    Services {
        exchange,
        cache,
        configuration: Arc::new(StaticConfiguration::new(trading_settings())),
    }
}

pub fn context(account_info: AccountInfo) -> SymbolContext {
    SymbolContext::new("BTCUSDT", false, FeatureToggle::default(), account_info)
}

/// Seed the producer's entries for BTCUSDT
pub async fn seed_market(cache: &dyn MarketCache, lowest_price: f64, close: f64) {
    let snapshot = IndicatorSnapshot {
        lowest_price,
        highest_price: lowest_price.max(close) * 1.1,
        trend: Trend::Turning,
        trend_diff: 0.0,
    };
    set_json(cache, SYMBOLS_NAMESPACE, &keys::indicator_data("BTCUSDT"), &snapshot)
        .await
        .unwrap();
    set_json(cache, SYMBOLS_NAMESPACE, &keys::latest_candle("BTCUSDT"), &candle(close))
        .await
        .unwrap();
}
