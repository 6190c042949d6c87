use crate::models::Trend;
use crate::settings::TrendWeights;

/// Result of the weighted pairwise trend heuristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub trend: Trend,
    /// Accumulated weighted percentage delta, rounded to 2 decimals
    pub diff: f64,
}

/// Classify the trend of a price series
///
/// Each consecutive pair `(a, b)` contributes `(b - a) * positive` when the
/// price did not fall and `(a - b) * -negative` when it fell, divided by `a`
/// and scaled to a percentage. Pairs starting at a non-positive price are
/// skipped. Fewer than two prices accumulate nothing and read as turning.
pub fn classify_trend(prices: &[f64], weights: TrendWeights) -> TrendReading {
    let positive = weights.positive;
    let negative = -weights.negative;

    let sum: f64 = prices
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| {
            let (earlier, later) = (pair[0], pair[1]);
            let weighted = if earlier <= later {
                (later - earlier) * positive
            } else {
                (earlier - later) * negative
            };
            weighted / earlier * 100.0
        })
        .sum();

    let mut diff = (sum * 100.0).round() / 100.0;
    if diff == 0.0 {
        diff = 0.0; // drop the sign of -0.0
    }

    let trend = if diff < 0.0 {
        Trend::Falling
    } else if diff == 0.0 {
        Trend::Turning
    } else {
        Trend::Up
    };

    TrendReading { trend, diff }
}
