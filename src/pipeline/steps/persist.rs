use async_trait::async_trait;
use tracing::info;

use crate::cache::{keys, set_json, SYMBOLS_NAMESPACE};
use crate::pipeline::{Services, Step, SymbolContext};
use crate::Result;

/// Persist the run's context and log it
pub struct SaveToCacheStep;

#[async_trait]
impl Step for SaveToCacheStep {
    fn name(&self) -> &'static str {
        "save-to-cache"
    }

    async fn execute(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        if ctx.save_to_cache {
            ctx.saved = true;
            set_json(
                services.cache.as_ref(),
                SYMBOLS_NAMESPACE,
                &keys::context(&ctx.symbol),
                &ctx,
            )
            .await?;
        }

        let data = serde_json::to_string(&ctx)?;
        info!(symbol = %ctx.symbol, action = %ctx.action, saved = ctx.saved, data = %data, "Finish process");
        Ok(ctx)
    }
}
