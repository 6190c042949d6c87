// Indicator and trailing-stop arithmetic
// Pure functions only; cache and exchange access live in the pipeline steps

pub mod trailing;
pub mod trend;

pub use trailing::{
    annotate_open_orders, buy_levels, partition_by_side, sell_levels, BuyLevels, SellLevels,
};
pub use trend::{classify_trend, TrendReading};

use crate::models::{Candle, IndicatorSnapshot};
use crate::settings::TrendWeights;

/// Lowest low and highest high over a candle window
pub fn price_range(candles: &[Candle]) -> Option<(f64, f64)> {
    let lowest = candles.iter().map(|c| c.low).reduce(f64::min)?;
    let highest = candles.iter().map(|c| c.high).reduce(f64::max)?;
    Some((lowest, highest))
}

/// Snapshot for a candle window; `None` for an empty window
pub fn build_snapshot(candles: &[Candle], weights: TrendWeights) -> Option<IndicatorSnapshot> {
    let (lowest_price, highest_price) = price_range(candles)?;

    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let reading = classify_trend(&lows, weights);

    Some(IndicatorSnapshot {
        lowest_price,
        highest_price,
        trend: reading.trend,
        trend_diff: reading.diff,
    })
}
