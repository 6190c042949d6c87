use async_trait::async_trait;
use tracing::info;

use crate::pipeline::{Action, Services, Step, SymbolContext, WaitReason};
use crate::Result;

/// Decide the run's action from the context alone
///
/// Returns the action and a human readable reason that ends up in the
/// buy or sell signal's `processMessage`.
pub fn decide(ctx: &SymbolContext) -> (Action, String) {
    if ctx.is_locked {
        return (
            Action::Wait(WaitReason::SymbolLocked),
            "Symbol is locked by another run".to_string(),
        );
    }

    let (Some(buy), Some(sell), Some(configuration), Some(info)) = (
        ctx.buy.as_ref(),
        ctx.sell.as_ref(),
        ctx.symbol_configuration.as_ref(),
        ctx.symbol_info.as_ref(),
    ) else {
        return (Action::NoAction, "Market data is not ready".to_string());
    };

    if !buy.open_orders.is_empty() {
        return (
            Action::Wait(WaitReason::BuyOrderOpen),
            format!("{} buy order(s) resting, wait", buy.open_orders.len()),
        );
    }
    if !sell.open_orders.is_empty() {
        return (
            Action::Wait(WaitReason::SellOrderOpen),
            format!("{} sell order(s) resting, wait", sell.open_orders.len()),
        );
    }

    let current_price = buy.levels.current_price;
    let (base_total, base_free) = ctx
        .base_asset_balance
        .as_ref()
        .map_or((0.0, 0.0), |b| (b.total, b.free));
    let quote_free = ctx.quote_asset_balance.as_ref().map_or(0.0, |b| b.free);

    let holding = sell.levels.last_buy_price.is_some() && base_total * current_price >= info.min_notional;

    if !holding && configuration.buy.enabled && current_price <= buy.levels.trigger_price {
        if quote_free >= info.min_notional {
            return (
                Action::BuyPending,
                format!(
                    "Price {} reached buy trigger {}",
                    current_price, buy.levels.trigger_price
                ),
            );
        }
        return (
            Action::Wait(WaitReason::InsufficientQuoteBalance),
            format!(
                "Free {} {} is below the minimum notional {}",
                info.quote_asset, quote_free, info.min_notional
            ),
        );
    }

    if holding && configuration.sell.enabled {
        if let Some(trigger_price) = sell.levels.trigger_price {
            if current_price >= trigger_price {
                if base_free * current_price >= info.min_notional {
                    return (
                        Action::SellPending,
                        format!("Price {} reached sell trigger {}", current_price, trigger_price),
                    );
                }
                return (
                    Action::Wait(WaitReason::InsufficientBaseBalance),
                    format!(
                        "Free {} {} is worth less than the minimum notional {}",
                        info.base_asset, base_free, info.min_notional
                    ),
                );
            }
        }
    }

    (Action::NoAction, "Waiting for a trigger".to_string())
}

pub struct DetermineActionStep;

#[async_trait]
impl Step for DetermineActionStep {
    fn name(&self) -> &'static str {
        "determine-action"
    }

    async fn execute(&self, _services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        let (action, message) = decide(&ctx);

        match action {
            Action::SellPending | Action::Wait(WaitReason::SellOrderOpen | WaitReason::InsufficientBaseBalance) => {
                if let Some(sell) = ctx.sell.as_mut() {
                    sell.process_message = message.clone();
                }
            }
            _ => {
                if let Some(buy) = ctx.buy.as_mut() {
                    buy.process_message = message.clone();
                }
            }
        }

        if action != ctx.action {
            info!(symbol = %ctx.symbol, action = %action, "{}", message);
        }
        ctx.action = action;
        Ok(ctx)
    }
}
