//! Indicator producer: candles in, snapshot and latest candle out

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{keys, set_json, MarketCache, SYMBOLS_NAMESPACE};
use crate::exchange::ExchangeClient;
use crate::indicators::build_snapshot;
use crate::models::IndicatorSnapshot;
use crate::notify::{report_failure, AlertSink};
use crate::settings::ConfigurationProvider;
use crate::Result;

pub struct IndicatorProducer {
    exchange: Arc<dyn ExchangeClient>,
    cache: Arc<dyn MarketCache>,
    configuration: Arc<dyn ConfigurationProvider>,
    alerts: Arc<dyn AlertSink>,
}

impl IndicatorProducer {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        cache: Arc<dyn MarketCache>,
        configuration: Arc<dyn ConfigurationProvider>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            exchange,
            cache,
            configuration,
            alerts,
        }
    }

    /// Refresh every currently configured symbol
    ///
    /// The symbol list is read on each call, so symbols added between cycles
    /// are picked up on the next one. Returns the symbols whose data was
    /// written.
    pub async fn execute_indicator_cycles(&self) -> Vec<String> {
        let global = match self.configuration.global_configuration().await {
            Ok(global) => global,
            Err(e) => {
                report_failure(self.alerts.as_ref(), "global-configuration", &e).await;
                return Vec::new();
            }
        };

        let mut refreshed = Vec::new();
        for symbol in global.symbols {
            if self.execute_indicator_cycle(&symbol).await.is_some() {
                refreshed.push(symbol);
            }
        }
        refreshed
    }

    /// Refresh one symbol, reporting any failure
    pub async fn execute_indicator_cycle(&self, symbol: &str) -> Option<IndicatorSnapshot> {
        match self.refresh(symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report_failure(self.alerts.as_ref(), symbol, &e).await;
                None
            }
        }
    }

    /// Fetch the configured candle window and write the snapshot and the
    /// newest candle. An empty window writes nothing.
    pub async fn refresh(&self, symbol: &str) -> Result<Option<IndicatorSnapshot>> {
        let configuration = self.configuration.symbol_configuration(symbol).await?;
        configuration.validate(symbol)?;

        let candles = self
            .exchange
            .fetch_candles(symbol, &configuration.candles.interval, configuration.candles.limit)
            .await?;

        let weights = configuration.strategy_options.trend_weights;
        let (Some(snapshot), Some(latest)) = (build_snapshot(&candles, weights), candles.last()) else {
            warn!(symbol = %symbol, "No candles returned, nothing to cache");
            return Ok(None);
        };

        let cache = self.cache.as_ref();
        set_json(cache, SYMBOLS_NAMESPACE, &keys::indicator_data(symbol), &snapshot).await?;
        set_json(cache, SYMBOLS_NAMESPACE, &keys::latest_candle(symbol), latest).await?;

        info!(
            symbol = %symbol,
            candles = candles.len(),
            lowest_price = snapshot.lowest_price,
            highest_price = snapshot.highest_price,
            close = latest.close,
            trend = ?snapshot.trend,
            trend_diff = snapshot.trend_diff,
            "Indicator data cached"
        );
        Ok(Some(snapshot))
    }
}
