use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::indicators::{BuyLevels, SellLevels};
use crate::models::{
    AccountInfo, AssetBalance, Candle, IndicatorSnapshot, Order, PlacedOrder, SymbolInfo,
};
use crate::settings::{FeatureToggle, SymbolConfiguration};

/// Why a run decided to wait
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WaitReason {
    SymbolLocked,
    BuyOrderOpen,
    SellOrderOpen,
    InsufficientQuoteBalance,
    InsufficientBaseBalance,
    BelowMinimumNotional,
}

impl WaitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitReason::SymbolLocked => "symbol-locked",
            WaitReason::BuyOrderOpen => "buy-order-open",
            WaitReason::SellOrderOpen => "sell-order-open",
            WaitReason::InsufficientQuoteBalance => "insufficient-quote-balance",
            WaitReason::InsufficientBaseBalance => "insufficient-base-balance",
            WaitReason::BelowMinimumNotional => "below-minimum-notional",
        }
    }
}

/// Decision state of one run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "reason", rename_all = "kebab-case")]
pub enum Action {
    #[default]
    NoAction,
    BuyPending,
    BuyPlaced,
    SellPending,
    SellPlaced,
    Wait(WaitReason),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoAction => write!(f, "no-action"),
            Action::BuyPending => write!(f, "buy-pending"),
            Action::BuyPlaced => write!(f, "buy-placed"),
            Action::SellPending => write!(f, "sell-pending"),
            Action::SellPlaced => write!(f, "sell-placed"),
            Action::Wait(reason) => write!(f, "wait({})", reason.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuySignal {
    #[serde(flatten)]
    pub levels: BuyLevels,
    pub open_orders: Vec<Order>,
    pub process_message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed: Option<PlacedOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SellSignal {
    #[serde(flatten)]
    pub levels: SellLevels,
    pub open_orders: Vec<Order>,
    pub process_message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed: Option<PlacedOrder>,
}

/// Outcome of confirming orders placed by earlier runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnsureReport {
    pub buy_filled: bool,
    /// A buy fill (full or partial) was written to the ledger this run
    pub buy_recorded: bool,
    pub sell_filled: bool,
    pub still_open: Vec<u64>,
    pub dropped: Vec<u64>,
}

/// State threaded through every step of one symbol run
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolContext {
    pub symbol: String,
    pub run_id: Uuid,
    pub is_locked: bool,
    pub feature_toggle: FeatureToggle,
    pub account_info: AccountInfo,

    pub symbol_configuration: Option<SymbolConfiguration>,
    pub symbol_info: Option<SymbolInfo>,
    pub base_asset_balance: Option<AssetBalance>,
    pub quote_asset_balance: Option<AssetBalance>,
    pub open_orders: Vec<Order>,
    pub last_candle: Option<Candle>,
    pub indicators: Option<IndicatorSnapshot>,
    pub buy: Option<BuySignal>,
    pub sell: Option<SellSignal>,
    pub action: Action,
    pub save_to_cache: bool,

    pub ensure: Option<EnsureReport>,
    pub handled: Vec<u64>,
    pub removed: bool,
    pub saved: bool,
}

impl SymbolContext {
    pub fn new(
        symbol: &str,
        is_locked: bool,
        feature_toggle: FeatureToggle,
        account_info: AccountInfo,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            run_id: Uuid::new_v4(),
            is_locked,
            feature_toggle,
            account_info,
            symbol_configuration: None,
            symbol_info: None,
            base_asset_balance: None,
            quote_asset_balance: None,
            open_orders: Vec::new(),
            last_candle: None,
            indicators: None,
            buy: None,
            sell: None,
            action: Action::NoAction,
            save_to_cache: true,
            ensure: None,
            handled: Vec::new(),
            removed: false,
            saved: false,
        }
    }

    /// Client order id for this run and side; retries within a run reuse it
    pub fn client_order_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.run_id.simple())
    }

    pub fn current_price(&self) -> Option<f64> {
        self.last_candle.as_ref().map(|c| c.close)
    }
}
