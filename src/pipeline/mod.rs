//! Per-symbol decision pipeline
//!
//! A run is a fixed, ordered list of [`Step`]s. Each step takes the
//! [`SymbolContext`] by value and hands back the updated one; the first error
//! ends the run for that symbol. Steps never abort the chain for missing
//! upstream data, they leave the context as it is (or clear
//! `save_to_cache`) and let the later steps carry on.

pub mod context;
pub mod steps;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info_span, Instrument};

use crate::cache::MarketCache;
use crate::exchange::ExchangeClient;
use crate::ledger::LastBuyPriceLedger;
use crate::settings::ConfigurationProvider;
use crate::Result;

pub use context::{Action, BuySignal, EnsureReport, SellSignal, SymbolContext, WaitReason};

/// Collaborators available to every step
#[derive(Clone)]
pub struct Services {
    pub exchange: Arc<dyn ExchangeClient>,
    pub cache: Arc<dyn MarketCache>,
    pub configuration: Arc<dyn ConfigurationProvider>,
}

impl Services {
    pub fn ledger(&self) -> LastBuyPriceLedger {
        LastBuyPriceLedger::new(self.cache.clone())
    }
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, services: &Services, ctx: SymbolContext) -> Result<SymbolContext>;
}

pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    /// The trailing-trade step order
    pub fn standard() -> Self {
        use steps::*;

        Self::with_steps(vec![
            Box::new(SymbolConfigurationStep),
            Box::new(SymbolInfoStep),
            Box::new(BalancesStep),
            Box::new(EnsureOrderPlacedStep),
            Box::new(OpenOrdersStep),
            Box::new(IndicatorsStep),
            Box::new(HandleOpenOrdersStep),
            Box::new(DetermineActionStep),
            Box::new(PlaceBuyOrderStep),
            Box::new(PlaceSellOrderStep),
            Box::new(RemoveLastBuyPriceStep),
            Box::new(SaveToCacheStep),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, services: &Services, mut ctx: SymbolContext) -> Result<SymbolContext> {
        for step in &self.steps {
            let span = info_span!("step", symbol = %ctx.symbol, step = step.name());
            ctx = step.execute(services, ctx).instrument(span).await?;
            debug!(symbol = %ctx.symbol, step = step.name(), action = %ctx.action, "Step done");
        }
        Ok(ctx)
    }
}
