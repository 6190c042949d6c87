use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::num;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
    LimitMaker,
    #[serde(other)]
    Other,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::StopLoss => "STOP_LOSS",
            OrderType::StopLossLimit => "STOP_LOSS_LIMIT",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
            OrderType::LimitMaker => "LIMIT_MAKER",
            OrderType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Still resting on the book (or about to leave it)
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::PendingCancel
        )
    }
}

/// Order as returned by the exchange, annotated in place by the pipeline
///
/// The derived fields are only filled for the current run and are never sent
/// back to the exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: u64,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub price: f64,
    #[serde(default, deserialize_with = "num::f64_from_any")]
    pub stop_price: f64,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub orig_qty: f64,
    #[serde(default, deserialize_with = "num::f64_from_any")]
    pub executed_qty: f64,
    #[serde(default, deserialize_with = "num::f64_from_any")]
    pub cummulative_quote_qty: f64,
    /// Creation time in milliseconds since epoch
    #[serde(default, alias = "transactTime")]
    pub time: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference_to_execute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference_to_cancel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_profit_percentage: Option<f64>,
}

impl Order {
    pub fn is_stop_loss_limit(&self) -> bool {
        self.order_type == OrderType::StopLossLimit
    }

    /// Average fill price, falling back to the limit price when nothing is
    /// reported as executed yet
    pub fn average_fill_price(&self) -> f64 {
        if self.executed_qty > 0.0 && self.cummulative_quote_qty > 0.0 {
            self.cummulative_quote_qty / self.executed_qty
        } else {
            self.price
        }
    }
}

/// New order to submit
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: String,
    pub price: String,
    pub stop_price: Option<String>,
    pub client_order_id: String,
}

/// What a run placed, kept in the cache until the next run confirms it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: u64,
    pub client_order_id: String,
    pub side: OrderSide,
    pub price: f64,
    pub stop_price: f64,
    pub quantity: f64,
    pub placed_at: DateTime<Utc>,
}
