use async_trait::async_trait;
use tracing::{info, warn};

use crate::cache::{get_json, keys, SYMBOLS_NAMESPACE};
use crate::models::{OrderSide, OrderStatus, PlacedOrder};
use crate::pipeline::steps::setup::apply_balances;
use crate::pipeline::{EnsureReport, Services, Step, SymbolContext};
use crate::Result;

pub(crate) fn placed_order_key(symbol: &str, side: OrderSide) -> String {
    match side {
        OrderSide::Buy => keys::last_buy_order(symbol),
        OrderSide::Sell => keys::last_sell_order(symbol),
    }
}

/// Confirm orders placed by earlier runs
///
/// A filled buy is averaged into the last-buy-price ledger. Records of
/// orders that left the book are dropped; resting orders keep theirs.
pub struct EnsureOrderPlacedStep;

#[async_trait]
impl Step for EnsureOrderPlacedStep {
    fn name(&self) -> &'static str {
        "ensure-order-placed"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        let cache = services.cache.as_ref();
        let mut report = EnsureReport::default();

        for side in [OrderSide::Buy, OrderSide::Sell] {
            let key = placed_order_key(&ctx.symbol, side);
            let Some(record) = get_json::<PlacedOrder>(cache, SYMBOLS_NAMESPACE, &key).await? else {
                continue;
            };

            let order = match services.exchange.fetch_order(&ctx.symbol, record.order_id).await {
                Ok(order) => order,
                Err(e) if e.is_unknown_order() => {
                    warn!(
                        symbol = %ctx.symbol,
                        order_id = record.order_id,
                        side = side.as_str(),
                        "Placed order unknown to the exchange, dropping its record"
                    );
                    report.dropped.push(record.order_id);
                    cache.delete(SYMBOLS_NAMESPACE, &key).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if order.status.is_open() {
                report.still_open.push(order.order_id);
                continue;
            }

            // Cancelled orders may still carry a partial fill
            let executed = if order.status == OrderStatus::Filled && order.executed_qty <= 0.0 {
                record.quantity
            } else {
                order.executed_qty
            };

            match (side, order.status) {
                (OrderSide::Buy, _) if executed > 0.0 => {
                    services
                        .ledger()
                        .record_buy(&ctx.symbol, order.average_fill_price(), executed)
                        .await?;
                    report.buy_filled = order.status == OrderStatus::Filled;
                    report.buy_recorded = true;
                }
                (OrderSide::Sell, OrderStatus::Filled) => {
                    info!(symbol = %ctx.symbol, order_id = order.order_id, "Sell order filled");
                    report.sell_filled = true;
                }
                _ => {}
            }

            if order.status != OrderStatus::Filled {
                warn!(
                    symbol = %ctx.symbol,
                    order_id = order.order_id,
                    status = ?order.status,
                    "Placed order left the book without filling"
                );
                report.dropped.push(order.order_id);
            }

            cache.delete(SYMBOLS_NAMESPACE, &key).await?;
        }

        // The cycle's account snapshot predates these fills
        if report.buy_recorded || report.sell_filled {
            ctx.account_info = services.exchange.fetch_account_info().await?;
            apply_balances(&mut ctx);
        }

        ctx.ensure = Some(report);
        Ok(ctx)
    }
}

pub struct OpenOrdersStep;

#[async_trait]
impl Step for OpenOrdersStep {
    fn name(&self) -> &'static str {
        "open-orders"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        ctx.open_orders = services.exchange.fetch_open_orders(&ctx.symbol).await?;
        Ok(ctx)
    }
}

/// Trail resting stop-loss-limit orders
///
/// A buy whose stop sits above the fresh buy limit, or a sell whose stop sits
/// below the fresh sell limit, is cancelled so the decision step can place
/// it again at the new level.
pub struct HandleOpenOrdersStep;

#[async_trait]
impl Step for HandleOpenOrdersStep {
    fn name(&self) -> &'static str {
        "handle-open-orders"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        if ctx.is_locked {
            return Ok(ctx);
        }
        let stale: Vec<(u64, OrderSide, f64)> = match (ctx.buy.as_ref(), ctx.sell.as_ref()) {
            (Some(buy), Some(sell)) => {
                let stale_buys = buy
                    .open_orders
                    .iter()
                    .filter(|o| o.is_stop_loss_limit() && o.stop_price > buy.levels.limit_price);
                let stale_sells = sell
                    .open_orders
                    .iter()
                    .filter(|o| o.is_stop_loss_limit() && o.stop_price < sell.levels.limit_price);
                stale_buys
                    .chain(stale_sells)
                    .map(|o| (o.order_id, o.side, o.stop_price))
                    .collect()
            }
            _ => Vec::new(),
        };

        if stale.is_empty() {
            return Ok(ctx);
        }

        for (order_id, side, stop_price) in &stale {
            info!(
                symbol = %ctx.symbol,
                order_id,
                side = side.as_str(),
                stop_price,
                "Cancelling stop-loss-limit order to trail the price"
            );
            services.exchange.cancel_order(&ctx.symbol, *order_id).await?;
            ctx.handled.push(*order_id);
        }

        let handled = ctx.handled.clone();
        ctx.open_orders.retain(|o| !handled.contains(&o.order_id));
        if let Some(buy) = ctx.buy.as_mut() {
            buy.open_orders.retain(|o| !handled.contains(&o.order_id));
        }
        if let Some(sell) = ctx.sell.as_mut() {
            sell.open_orders.retain(|o| !handled.contains(&o.order_id));
        }

        // Cancelling releases the locked balance
        ctx.account_info = services.exchange.fetch_account_info().await?;
        apply_balances(&mut ctx);

        Ok(ctx)
    }
}
