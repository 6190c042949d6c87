// Exchange collaborator: the trait the pipeline calls and the Binance client
pub mod binance;
pub mod error;

use async_trait::async_trait;

use crate::models::{AccountInfo, Candle, Order, OrderRequest, SymbolInfo};

pub use binance::BinanceClient;
pub use error::{ExchangeError, NetworkErrorKind};

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Exchange operations used by the decision pipeline and indicator producer
///
/// Implementations classify every failure into an [`ExchangeError`] before
/// returning it.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>>;

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>>;

    async fn fetch_order(&self, symbol: &str, order_id: u64) -> ExchangeResult<Order>;

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<Order>;

    async fn cancel_order(&self, symbol: &str, order_id: u64) -> ExchangeResult<()>;

    async fn fetch_account_info(&self) -> ExchangeResult<AccountInfo>;

    async fn fetch_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo>;
}
