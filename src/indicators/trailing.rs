use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderSide};
use crate::settings::{BuySettings, SellSettings};

/// Buy-side trailing levels for the current price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuyLevels {
    pub current_price: f64,
    pub lowest_price: f64,
    pub limit_price: f64,
    pub limit_percentage: f64,
    pub trigger_price: f64,
    /// Negative while the price is still below the trigger
    pub difference: f64,
}

/// Sell-side trailing levels; trigger and profit fields are only known with a
/// cost basis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellLevels {
    pub current_price: f64,
    pub limit_price: f64,
    pub limit_percentage: f64,
    pub last_buy_price: Option<f64>,
    pub trigger_price: Option<f64>,
    pub difference: Option<f64>,
    pub current_profit: Option<f64>,
    pub current_profit_percentage: Option<f64>,
}

pub fn buy_levels(lowest_price: f64, current_price: f64, settings: &BuySettings) -> BuyLevels {
    let trigger_price = lowest_price * settings.trigger_percentage;

    BuyLevels {
        current_price,
        lowest_price,
        limit_price: current_price * settings.limit_percentage,
        limit_percentage: settings.limit_percentage,
        trigger_price,
        difference: (1.0 - current_price / trigger_price) * -100.0,
    }
}

/// A last buy price of zero or below counts as no cost basis
pub fn sell_levels(
    last_buy_price: Option<f64>,
    current_price: f64,
    base_total: f64,
    settings: &SellSettings,
) -> SellLevels {
    let last_buy_price = last_buy_price.filter(|price| *price > 0.0);
    let trigger_price = last_buy_price.map(|last| last * settings.trigger_percentage);

    SellLevels {
        current_price,
        limit_price: current_price * settings.limit_percentage,
        limit_percentage: settings.limit_percentage,
        last_buy_price,
        trigger_price,
        difference: trigger_price.map(|trigger| (1.0 - trigger / current_price) * 100.0),
        current_profit: last_buy_price.map(|last| (current_price - last) * base_total),
        current_profit_percentage: last_buy_price.map(|last| (1.0 - last / current_price) * 100.0),
    }
}

fn order_time(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

/// Attach current-run figures to open orders
///
/// Every order gets `currentPrice` and `updatedAt`. Only stop-loss-limit
/// orders get the side's limit and distance fields.
pub fn annotate_open_orders(orders: &mut [Order], buy: &BuyLevels, sell: &SellLevels) {
    for order in orders.iter_mut() {
        let current_price = buy.current_price;
        order.current_price = Some(current_price);
        order.updated_at = Some(order_time(order.time));

        if !order.is_stop_loss_limit() {
            continue;
        }

        let (limit_price, limit_percentage) = match order.side {
            OrderSide::Buy => (buy.limit_price, buy.limit_percentage),
            OrderSide::Sell => (sell.limit_price, sell.limit_percentage),
        };

        order.limit_price = Some(limit_price);
        order.limit_percentage = Some(limit_percentage);
        order.difference_to_execute = Some((1.0 - order.stop_price / current_price) * 100.0);
        order.difference_to_cancel = Some((1.0 - order.stop_price / limit_price) * 100.0);

        if order.side == OrderSide::Sell {
            order.minimum_profit = sell
                .last_buy_price
                .map(|last| (order.price - last) * order.orig_qty);
            order.minimum_profit_percentage = sell
                .last_buy_price
                .map(|last| (1.0 - last / order.price) * 100.0);
        }
    }
}

/// Split into (buy, sell) keeping exchange order
pub fn partition_by_side(orders: Vec<Order>) -> (Vec<Order>, Vec<Order>) {
    orders.into_iter().partition(|o| o.side == OrderSide::Buy)
}
