use std::collections::{BTreeMap, HashMap};

use ::config::{Config, ConfigError, Environment, File};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_requests_per_minute() -> u32 {
    600
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    120
}

fn default_decision_interval_secs() -> u64 {
    10
}

fn default_indicator_interval_secs() -> u64 {
    60
}

fn default_weight() -> f64 {
    1.0
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            secret_key: String::new(),
            recv_window: default_recv_window(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertSettings {
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_decision_interval_secs")]
    pub decision_interval_secs: u64,
    #[serde(default = "default_indicator_interval_secs")]
    pub indicator_interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            decision_interval_secs: default_decision_interval_secs(),
            indicator_interval_secs: default_indicator_interval_secs(),
        }
    }
}

/// Feature flags, read once at the start of each symbol run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct FeatureToggle {
    /// Take the advisory per-symbol lock around each decision run
    #[serde(default)]
    pub symbol_lock: bool,
    #[serde(default, flatten)]
    pub flags: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandleSettings {
    pub interval: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct BuySettings {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Multiplier on the window's lowest price
    pub trigger_percentage: f64,
    /// Multiplier on the current price for the stop of a new buy order
    pub stop_percentage: f64,
    /// Multiplier on the current price for the limit of a new buy order
    pub limit_percentage: f64,
    /// Quote amount spent per buy
    pub max_purchase_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct SellSettings {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Multiplier on the last buy price
    pub trigger_percentage: f64,
    pub stop_percentage: f64,
    pub limit_percentage: f64,
}

/// Asymmetric weights for the trend heuristic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendWeights {
    #[serde(default = "default_weight")]
    pub positive: f64,
    #[serde(default = "default_weight")]
    pub negative: f64,
}

impl Default for TrendWeights {
    fn default() -> Self {
        Self {
            positive: default_weight(),
            negative: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct StrategyOptions {
    #[serde(default)]
    pub trend_weights: TrendWeights,
}

/// Trading parameters for one symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct SymbolConfiguration {
    pub candles: CandleSettings,
    pub buy: BuySettings,
    pub sell: SellSettings,
    #[serde(default)]
    pub strategy_options: StrategyOptions,
}

impl SymbolConfiguration {
    pub fn validate(&self, symbol: &str) -> Result<()> {
        let multipliers = [
            ("buy.trigger_percentage", self.buy.trigger_percentage),
            ("buy.stop_percentage", self.buy.stop_percentage),
            ("buy.limit_percentage", self.buy.limit_percentage),
            ("sell.trigger_percentage", self.sell.trigger_percentage),
            ("sell.stop_percentage", self.sell.stop_percentage),
            ("sell.limit_percentage", self.sell.limit_percentage),
        ];

        for (name, value) in multipliers {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_data(
                    symbol,
                    format!("{} must be positive, got {}", name, value),
                ));
            }
        }

        if self.candles.limit == 0 {
            return Err(Error::invalid_data(symbol, "candles.limit must be at least 1"));
        }

        Ok(())
    }
}

/// Process-wide settings for one decision cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfiguration {
    pub symbols: Vec<String>,
    pub feature_toggle: FeatureToggle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingSettings {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub feature_toggle: FeatureToggle,
    pub defaults: SymbolConfiguration,
    #[serde(default)]
    pub overrides: HashMap<String, SymbolConfiguration>,
}

impl TradingSettings {
    pub fn global_configuration(&self) -> GlobalConfiguration {
        GlobalConfiguration {
            symbols: self.symbols.clone(),
            feature_toggle: self.feature_toggle.clone(),
        }
    }

    /// Per-symbol override if present, else the defaults. Lookup ignores case
    /// since file keys may come back lowercased.
    pub fn symbol_configuration(&self, symbol: &str) -> SymbolConfiguration {
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(symbol))
            .map(|(_, config)| config.clone())
            .unwrap_or_else(|| self.defaults.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    pub trading: TradingSettings,
}

impl AppConfig {
    /// Load `path` (optional) layered under `TRAILBOT__SECTION__KEY`
    /// environment variables
    pub fn load(path: &str) -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TRAILBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trading.symbols")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

/// Source of global and per-symbol configuration
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    async fn global_configuration(&self) -> Result<GlobalConfiguration>;

    async fn symbol_configuration(&self, symbol: &str) -> Result<SymbolConfiguration>;
}

/// Re-reads the settings file on every call so edits apply from the next cycle
pub struct FileConfiguration {
    path: String,
}

impl FileConfiguration {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigurationProvider for FileConfiguration {
    async fn global_configuration(&self) -> Result<GlobalConfiguration> {
        Ok(AppConfig::load(&self.path)?.trading.global_configuration())
    }

    async fn symbol_configuration(&self, symbol: &str) -> Result<SymbolConfiguration> {
        Ok(AppConfig::load(&self.path)?.trading.symbol_configuration(symbol))
    }
}

/// Fixed configuration held in memory
pub struct StaticConfiguration {
    trading: TradingSettings,
}

impl StaticConfiguration {
    pub fn new(trading: TradingSettings) -> Self {
        Self { trading }
    }
}

#[async_trait]
impl ConfigurationProvider for StaticConfiguration {
    async fn global_configuration(&self) -> Result<GlobalConfiguration> {
        Ok(self.trading.global_configuration())
    }

    async fn symbol_configuration(&self, symbol: &str) -> Result<SymbolConfiguration> {
        Ok(self.trading.symbol_configuration(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[exchange]
api_key = "key"
secret_key = "secret"

[trading]
symbols = ["BTCUSDT", "ETHUSDT"]

[trading.feature_toggle]
symbol_lock = true
notify_debug = false

[trading.defaults.candles]
interval = "1d"
limit = 10

[trading.defaults.buy]
trigger_percentage = 1.0
stop_percentage = 1.02
limit_percentage = 1.021
max_purchase_amount = 100.0

[trading.defaults.sell]
trigger_percentage = 1.06
stop_percentage = 0.99
limit_percentage = 0.989

[trading.overrides.ETHUSDT.candles]
interval = "4h"
limit = 20

[trading.overrides.ETHUSDT.buy]
trigger_percentage = 1.01
stop_percentage = 1.02
limit_percentage = 1.021
max_purchase_amount = 50.0

[trading.overrides.ETHUSDT.sell]
trigger_percentage = 1.05
stop_percentage = 0.98
limit_percentage = 0.979
"#;

    fn write_sample() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("trailbot-settings-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_settings_file() {
        let path = write_sample();
        let config = AppConfig::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.exchange.base_url, "https://api.binance.com");
        assert_eq!(config.cache.lock_ttl_secs, 120);
        assert_eq!(config.trading.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert!(config.trading.feature_toggle.symbol_lock);
        assert_eq!(config.trading.feature_toggle.flags.get("notify_debug"), Some(&false));

        let btc = config.trading.symbol_configuration("BTCUSDT");
        assert_eq!(btc.candles.interval, "1d");
        assert!(btc.buy.enabled);
        assert_eq!(btc.strategy_options.trend_weights, TrendWeights::default());

        let eth = config.trading.symbol_configuration("ETHUSDT");
        assert_eq!(eth.candles.limit, 20);
        assert_eq!(eth.buy.max_purchase_amount, 50.0);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_file_configuration_provider() {
        let path = write_sample();
        let provider = FileConfiguration::new(path.to_str().unwrap());

        let global = provider.global_configuration().await.unwrap();
        assert_eq!(global.symbols.len(), 2);

        let eth = provider.symbol_configuration("ETHUSDT").await.unwrap();
        assert_eq!(eth.sell.trigger_percentage, 1.05);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_validate_rejects_non_positive_multiplier() {
        let path = write_sample();
        let config = AppConfig::load(path.to_str().unwrap()).unwrap();
        let mut symbol_config = config.trading.symbol_configuration("BTCUSDT");
        assert!(symbol_config.validate("BTCUSDT").is_ok());

        symbol_config.sell.limit_percentage = 0.0;
        let err = symbol_config.validate("BTCUSDT").unwrap_err();
        assert!(err.to_string().contains("sell.limit_percentage"));

        std::fs::remove_file(path).ok();
    }
}
