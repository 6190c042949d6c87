use async_trait::async_trait;
use tracing::debug;

use crate::cache::{get_json, keys, set_json, SYMBOLS_NAMESPACE};
use crate::models::{AssetBalance, SymbolInfo};
use crate::pipeline::{Services, Step, SymbolContext};
use crate::Result;

pub struct SymbolConfigurationStep;

#[async_trait]
impl Step for SymbolConfigurationStep {
    fn name(&self) -> &'static str {
        "symbol-configuration"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        let configuration = services.configuration.symbol_configuration(&ctx.symbol).await?;
        configuration.validate(&ctx.symbol)?;
        ctx.symbol_configuration = Some(configuration);
        Ok(ctx)
    }
}

/// Exchange rules, fetched once and then served from the cache
pub struct SymbolInfoStep;

#[async_trait]
impl Step for SymbolInfoStep {
    fn name(&self) -> &'static str {
        "symbol-info"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        let key = keys::symbol_info(&ctx.symbol);
        let cached: Option<SymbolInfo> = get_json(services.cache.as_ref(), SYMBOLS_NAMESPACE, &key).await?;

        let info = match cached {
            Some(info) => info,
            None => {
                let info = services.exchange.fetch_symbol_info(&ctx.symbol).await?;
                set_json(services.cache.as_ref(), SYMBOLS_NAMESPACE, &key, &info).await?;
                debug!(symbol = %ctx.symbol, "Cached symbol info");
                info
            }
        };

        ctx.symbol_info = Some(info);
        Ok(ctx)
    }
}

/// Base and quote balances from the account snapshot already in the context
pub struct BalancesStep;

pub(crate) fn apply_balances(ctx: &mut SymbolContext) {
    let Some(info) = ctx.symbol_info.as_ref() else {
        return;
    };

    let mut base = AssetBalance::from_account(&ctx.account_info, &info.base_asset);
    // Keep the estimate across refreshes within the run
    if let Some(current) = ctx.current_price() {
        base.estimated_value = Some(base.total * current);
    }
    ctx.quote_asset_balance = Some(AssetBalance::from_account(&ctx.account_info, &info.quote_asset));
    ctx.base_asset_balance = Some(base);
}

#[async_trait]
impl Step for BalancesStep {
    fn name(&self) -> &'static str {
        "balances"
    }

    async fn execute(&self, _services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        apply_balances(&mut ctx);
        Ok(ctx)
    }
}
