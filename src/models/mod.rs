use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod account;
pub mod order;

pub use account::{AccountInfo, AssetBalance, Balance, SymbolInfo};
pub use order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType, PlacedOrder};

/// OHLCV candlestick for one interval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub symbol: String,
    pub open_time: DateTime<Utc>,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub open: f64,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub high: f64,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub low: f64,
    #[serde(deserialize_with = "num::f64_from_any")]
    pub close: f64,
    #[serde(default, deserialize_with = "num::f64_from_any")]
    pub volume: f64,
}

/// Trend classification attached to an indicator snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Trend {
    #[serde(rename = "FALLING")]
    Falling,
    #[serde(rename = "TREND IS TURNING")]
    Turning,
    #[serde(rename = "UP")]
    Up,
}

/// Window statistics written by the indicator producer and read by the
/// decision pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub lowest_price: f64,
    pub highest_price: f64,
    pub trend: Trend,
    pub trend_diff: f64,
}

/// Exchange payloads carry decimals as strings; cached payloads carry numbers.
pub(crate) mod num {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(f64),
    }

    pub fn f64_from_any<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StrOrNum::deserialize(deserializer)? {
            StrOrNum::Num(n) => Ok(n),
            StrOrNum::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        }
    }
}
