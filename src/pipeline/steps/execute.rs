use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};

use crate::cache::{keys, set_json, SYMBOLS_NAMESPACE};
use crate::models::{OrderRequest, OrderSide, OrderType, PlacedOrder, SymbolInfo};
use crate::pipeline::steps::orders::placed_order_key;
use crate::pipeline::{Action, Services, Step, SymbolContext, WaitReason};
use crate::Result;

/// A stop-loss-limit order rounded to the symbol's filters
struct PreparedOrder {
    request: OrderRequest,
    price: f64,
    stop_price: f64,
    quantity: f64,
}

fn prepare(
    ctx: &SymbolContext,
    info: &SymbolInfo,
    side: OrderSide,
    limit_price: f64,
    stop_price: f64,
    quantity: impl FnOnce(f64) -> f64,
) -> Option<PreparedOrder> {
    let price = info.round_price(limit_price);
    let stop = info.round_price(stop_price);
    let price_value = price.to_f64().filter(|p| *p > 0.0)?;
    let stop_value = stop.to_f64()?;

    let qty = info.floor_quantity(quantity(price_value));
    let qty_value = qty.to_f64()?;
    if !info.meets_minimums(price_value, qty_value) {
        return None;
    }

    let prefix = match side {
        OrderSide::Buy => "b",
        OrderSide::Sell => "s",
    };

    Some(PreparedOrder {
        request: OrderRequest {
            symbol: ctx.symbol.clone(),
            side,
            order_type: OrderType::StopLossLimit,
            quantity: qty.to_string(),
            price: price.to_string(),
            stop_price: Some(stop.to_string()),
            client_order_id: ctx.client_order_id(prefix),
        },
        price: price_value,
        stop_price: stop_value,
        quantity: qty_value,
    })
}

async fn submit(services: &Services, ctx: &SymbolContext, prepared: PreparedOrder) -> Result<PlacedOrder> {
    let order = services.exchange.place_order(&prepared.request).await?;

    let placed = PlacedOrder {
        order_id: order.order_id,
        client_order_id: prepared.request.client_order_id.clone(),
        side: prepared.request.side,
        price: prepared.price,
        stop_price: prepared.stop_price,
        quantity: prepared.quantity,
        placed_at: Utc::now(),
    };
    set_json(
        services.cache.as_ref(),
        SYMBOLS_NAMESPACE,
        &placed_order_key(&ctx.symbol, placed.side),
        &placed,
    )
    .await?;

    info!(
        symbol = %ctx.symbol,
        side = placed.side.as_str(),
        order_id = placed.order_id,
        price = placed.price,
        stop_price = placed.stop_price,
        quantity = placed.quantity,
        "Placed stop-loss-limit order"
    );
    Ok(placed)
}

pub struct PlaceBuyOrderStep;

#[async_trait]
impl Step for PlaceBuyOrderStep {
    fn name(&self) -> &'static str {
        "place-buy-order"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        if ctx.action != Action::BuyPending {
            return Ok(ctx);
        }
        let (Some(info), Some(configuration)) =
            (ctx.symbol_info.clone(), ctx.symbol_configuration.clone())
        else {
            return Ok(ctx);
        };
        let Some((current_price, limit_price)) = ctx
            .buy
            .as_ref()
            .map(|buy| (buy.levels.current_price, buy.levels.limit_price))
        else {
            return Ok(ctx);
        };

        let quote_free = ctx.quote_asset_balance.as_ref().map_or(0.0, |b| b.free);
        let amount = configuration.buy.max_purchase_amount.min(quote_free);
        let stop_price = current_price * configuration.buy.stop_percentage;

        let prepared = prepare(&ctx, &info, OrderSide::Buy, limit_price, stop_price, |price| {
            amount / price
        });
        let Some(prepared) = prepared else {
            warn!(symbol = %ctx.symbol, amount, "Buy order would be below the exchange minimums");
            ctx.action = Action::Wait(WaitReason::BelowMinimumNotional);
            if let Some(buy) = ctx.buy.as_mut() {
                buy.process_message = format!(
                    "Order for {} {} is below the exchange minimums",
                    amount, info.quote_asset
                );
            }
            return Ok(ctx);
        };

        let placed = submit(services, &ctx, prepared).await?;
        if let Some(buy) = ctx.buy.as_mut() {
            buy.process_message = format!("Placed buy order {}", placed.order_id);
            buy.placed = Some(placed);
        }
        ctx.action = Action::BuyPlaced;
        Ok(ctx)
    }
}

pub struct PlaceSellOrderStep;

#[async_trait]
impl Step for PlaceSellOrderStep {
    fn name(&self) -> &'static str {
        "place-sell-order"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        if ctx.action != Action::SellPending {
            return Ok(ctx);
        }
        let (Some(info), Some(configuration)) =
            (ctx.symbol_info.clone(), ctx.symbol_configuration.clone())
        else {
            return Ok(ctx);
        };
        let Some((current_price, limit_price)) = ctx
            .sell
            .as_ref()
            .map(|sell| (sell.levels.current_price, sell.levels.limit_price))
        else {
            return Ok(ctx);
        };

        let base_free = ctx.base_asset_balance.as_ref().map_or(0.0, |b| b.free);
        let stop_price = current_price * configuration.sell.stop_percentage;

        let prepared = prepare(&ctx, &info, OrderSide::Sell, limit_price, stop_price, |_| base_free);
        let Some(prepared) = prepared else {
            warn!(symbol = %ctx.symbol, base_free, "Sell order would be below the exchange minimums");
            ctx.action = Action::Wait(WaitReason::BelowMinimumNotional);
            if let Some(sell) = ctx.sell.as_mut() {
                sell.process_message = format!(
                    "Order for {} {} is below the exchange minimums",
                    base_free, info.base_asset
                );
            }
            return Ok(ctx);
        };

        let placed = submit(services, &ctx, prepared).await?;
        if let Some(sell) = ctx.sell.as_mut() {
            sell.process_message = format!("Placed sell order {}", placed.order_id);
            sell.placed = Some(placed);
        }
        ctx.action = Action::SellPlaced;
        Ok(ctx)
    }
}

/// Forget the cost basis once the position is gone
///
/// The position counts as closed when the remaining base balance is worth
/// less than the minimum notional and no sell order is resting or awaiting
/// confirmation. A run that just recorded a buy fill never removes it.
pub struct RemoveLastBuyPriceStep;

#[async_trait]
impl Step for RemoveLastBuyPriceStep {
    fn name(&self) -> &'static str {
        "remove-last-buy-price"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        if ctx.is_locked || ctx.action == Action::SellPlaced {
            return Ok(ctx);
        }
        // Balances can lag a fill recorded moments ago
        if ctx.ensure.as_ref().is_some_and(|report| report.buy_recorded) {
            return Ok(ctx);
        }
        let (Some(min_notional), Some(current_price)) = (
            ctx.symbol_info.as_ref().map(|info| info.min_notional),
            ctx.current_price(),
        ) else {
            return Ok(ctx);
        };

        let ledger = services.ledger();
        if ledger.get(&ctx.symbol).await?.is_none() {
            return Ok(ctx);
        }

        let base_total = ctx.base_asset_balance.as_ref().map_or(0.0, |b| b.total);
        if base_total * current_price >= min_notional {
            return Ok(ctx);
        }

        if ctx.open_orders.iter().any(|o| o.side == OrderSide::Sell) {
            return Ok(ctx);
        }
        let pending_sell = services
            .cache
            .exists(SYMBOLS_NAMESPACE, &keys::last_sell_order(&ctx.symbol))
            .await?;
        if pending_sell {
            return Ok(ctx);
        }

        ctx.removed = ledger.remove(&ctx.symbol).await?;
        Ok(ctx)
    }
}
