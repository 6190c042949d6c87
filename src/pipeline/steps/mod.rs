mod decision;
mod execute;
mod indicators;
mod orders;
mod persist;
mod setup;

pub use decision::{decide, DetermineActionStep};
pub use execute::{PlaceBuyOrderStep, PlaceSellOrderStep, RemoveLastBuyPriceStep};
pub use indicators::IndicatorsStep;
pub use orders::{EnsureOrderPlacedStep, HandleOpenOrdersStep, OpenOrdersStep};
pub use persist::SaveToCacheStep;
pub use setup::{BalancesStep, SymbolConfigurationStep, SymbolInfoStep};
