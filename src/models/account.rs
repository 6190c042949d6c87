use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::num;

/// Raw balance line from the account endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub asset: String,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub free: f64,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub locked: f64,
}

/// Account snapshot, fetched once per decision cycle and shared by every
/// symbol processed in that cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    pub fn balance(&self, asset: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.asset == asset)
    }
}

/// Balance of one side of a symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
}

impl AssetBalance {
    /// Missing assets count as an empty balance; negative values from the
    /// exchange are clamped so totals stay non-negative
    pub fn from_account(account: &AccountInfo, asset: &str) -> Self {
        let (free, locked) = account
            .balance(asset)
            .map(|b| (b.free.max(0.0), b.locked.max(0.0)))
            .unwrap_or((0.0, 0.0));

        Self {
            asset: asset.to_string(),
            free,
            locked,
            total: free + locked,
            estimated_value: None,
        }
    }
}

/// Exchange trading rules for a symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub tick_size: f64,
    pub step_size: f64,
    pub min_qty: f64,
    pub min_notional: f64,
}

impl SymbolInfo {
    /// Round a price to the nearest tick
    pub fn round_price(&self, price: f64) -> Decimal {
        let price = Decimal::from_f64(price).unwrap_or_default();
        let tick = Decimal::from_f64(self.tick_size).unwrap_or_default();
        if tick.is_zero() {
            return price.normalize();
        }
        ((price / tick).round() * tick).normalize()
    }

    /// Round a quantity down to the lot step
    pub fn floor_quantity(&self, quantity: f64) -> Decimal {
        let quantity = Decimal::from_f64(quantity.max(0.0)).unwrap_or_default();
        let step = Decimal::from_f64(self.step_size).unwrap_or_default();
        if step.is_zero() {
            return quantity.normalize();
        }
        ((quantity / step).floor() * step).normalize()
    }

    /// Whether price × quantity clears the exchange minimums
    pub fn meets_minimums(&self, price: f64, quantity: f64) -> bool {
        quantity >= self.min_qty && price * quantity >= self.min_notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc_info() -> SymbolInfo {
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

    #[test]
    fn test_round_price_to_tick() {
        let info = btc_info();
        assert_eq!(info.round_price(61000.126).to_string(), "61000.13");
        assert_eq!(info.round_price(61000.0).to_string(), "61000");
    }

    #[test]
    fn test_floor_quantity_to_step() {
        let info = btc_info();
        assert_eq!(info.floor_quantity(0.0016399).to_string(), "0.00163");
        assert_eq!(info.floor_quantity(-1.0).to_string(), "0");
    }

    #[test]
    fn test_meets_minimums() {
        let info = btc_info();
        assert!(info.meets_minimums(61000.0, 0.001));
        assert!(!info.meets_minimums(61000.0, 0.0001));
    }

    #[test]
    fn test_asset_balance_from_account() {
        let account = AccountInfo {
            can_trade: true,
            update_time: 0,
            balances: vec![Balance {
                asset: "BTC".to_string(),
                free: 0.5,
                locked: 0.25,
            }],
        };

        let btc = AssetBalance::from_account(&account, "BTC");
        assert_eq!(btc.total, 0.75);

        let usdt = AssetBalance::from_account(&account, "USDT");
        assert_eq!(usdt.total, 0.0);
        assert!(usdt.estimated_value.is_none());
    }
}
