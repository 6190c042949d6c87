use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::cache::{get_json, keys, SYMBOLS_NAMESPACE};
use crate::indicators::{annotate_open_orders, buy_levels, partition_by_side, sell_levels};
use crate::models::{Candle, IndicatorSnapshot};
use crate::pipeline::{BuySignal, SellSignal, Services, Step, SymbolContext};
use crate::Result;

/// Merge the producer's snapshot into the run and derive trailing levels
///
/// Missing producer data is not an error: the run carries on without
/// signals and is not persisted.
pub struct IndicatorsStep;

#[async_trait]
impl Step for IndicatorsStep {
    fn name(&self) -> &'static str {
        "indicators"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        let Some(configuration) = ctx.symbol_configuration.clone() else {
            ctx.save_to_cache = false;
            return Ok(ctx);
        };
        let cache = services.cache.as_ref();

        let snapshot: Option<IndicatorSnapshot> =
            get_json(cache, SYMBOLS_NAMESPACE, &keys::indicator_data(&ctx.symbol)).await?;
        let Some(snapshot) = snapshot else {
            info!(symbol = %ctx.symbol, "Indicator data is not retrieved, wait for cache");
            ctx.save_to_cache = false;
            return Ok(ctx);
        };

        let candle: Option<Candle> =
            get_json(cache, SYMBOLS_NAMESPACE, &keys::latest_candle(&ctx.symbol)).await?;
        let Some(candle) = candle else {
            info!(symbol = %ctx.symbol, "Last candle is not retrieved, wait for cache");
            ctx.save_to_cache = false;
            return Ok(ctx);
        };

        let current_price = candle.close;
        let last_buy_price = services.ledger().last_buy_price(&ctx.symbol).await?;
        let base_total = ctx.base_asset_balance.as_ref().map_or(0.0, |b| b.total);

        let buy = buy_levels(snapshot.lowest_price, current_price, &configuration.buy);
        let sell = sell_levels(last_buy_price, current_price, base_total, &configuration.sell);

        if let Some(base) = ctx.base_asset_balance.as_mut() {
            base.estimated_value = Some(base.total * current_price);
        }

        annotate_open_orders(&mut ctx.open_orders, &buy, &sell);
        let (buy_orders, sell_orders) = partition_by_side(ctx.open_orders.clone());

        let now = Utc::now();
        ctx.buy = Some(BuySignal {
            levels: buy,
            open_orders: buy_orders,
            process_message: String::new(),
            updated_at: now,
            placed: None,
        });
        ctx.sell = Some(SellSignal {
            levels: sell,
            open_orders: sell_orders,
            process_message: String::new(),
            updated_at: now,
            placed: None,
        });
        ctx.last_candle = Some(candle);
        ctx.indicators = Some(snapshot);

        Ok(ctx)
    }
}
