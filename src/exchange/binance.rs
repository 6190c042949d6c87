use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use super::{ExchangeClient, ExchangeError, ExchangeResult};
use crate::models::{AccountInfo, Candle, Order, OrderRequest, OrderType, SymbolInfo};
use crate::settings::ExchangeSettings;

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot REST client
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    recv_window: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    filters: Vec<Value>,
}

fn value_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

impl ExchangeSymbol {
    fn filter_value(&self, filter_types: &[&str], field: &str) -> f64 {
        self.filters
            .iter()
            .filter(|f| {
                f.get("filterType")
                    .and_then(Value::as_str)
                    .is_some_and(|t| filter_types.contains(&t))
            })
            .find_map(|f| value_f64(f.get(field)))
            .unwrap_or(0.0)
    }

    fn into_symbol_info(self) -> SymbolInfo {
        SymbolInfo {
            tick_size: self.filter_value(&["PRICE_FILTER"], "tickSize"),
            step_size: self.filter_value(&["LOT_SIZE"], "stepSize"),
            min_qty: self.filter_value(&["LOT_SIZE"], "minQty"),
            min_notional: self.filter_value(&["MIN_NOTIONAL", "NOTIONAL"], "minNotional"),
            symbol: self.symbol,
            status: self.status,
            base_asset: self.base_asset,
            quote_asset: self.quote_asset,
        }
    }
}

/// Kline rows are positional: [openTime, open, high, low, close, volume, ...]
fn parse_kline(symbol: &str, row: &[Value]) -> ExchangeResult<Candle> {
    let field = |i: usize| {
        value_f64(row.get(i))
            .ok_or_else(|| ExchangeError::Decode(format!("kline field {} missing for {}", i, symbol)))
    };

    let open_time_ms = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ExchangeError::Decode(format!("kline open time missing for {}", symbol)))?;
    let open_time = DateTime::<Utc>::from_timestamp_millis(open_time_ms)
        .ok_or_else(|| ExchangeError::Decode(format!("kline open time out of range: {}", open_time_ms)))?;

    Ok(Candle {
        symbol: symbol.to_string(),
        open_time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

impl BinanceClient {
    pub fn new(settings: &ExchangeSettings) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::from_transport(&e))?;

        let per_minute = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
            recv_window: settings.recv_window,
            rate_limiter,
        })
    }

    fn sign_and_build_query(&self, params: Vec<(&str, String)>) -> ExchangeResult<String> {
        let mut params = params;
        params.push(("recvWindow", self.recv_window.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query_string = serde_urlencoded::to_string(&params)
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Decode(format!("invalid secret key: {}", e)))?;
        mac.update(query_string.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query_string, signature))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ExchangeResult<T> {
        self.rate_limiter.until_ready().await;

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::from_transport(&e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::from_transport(&e))?;

        if !status.is_success() {
            let err = ExchangeError::from_response(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), retryable = err.is_retryable(), "Binance request failed: {}", err);
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Decode(e.to_string()))
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> ExchangeResult<T> {
        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let url = format!("{}{}?{}", self.base_url, endpoint, query);
        self.send(self.client.get(&url)).await
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> ExchangeResult<T> {
        let query = self.sign_and_build_query(params)?;
        let url = format!("{}{}?{}", self.base_url, endpoint, query);
        let request = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key);
        self.send(request).await
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> ExchangeResult<Vec<Candle>> {
        let rows: Vec<Vec<Value>> = self
            .public_get(
                "/api/v3/klines",
                vec![
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter().map(|row| parse_kline(symbol, row)).collect()
    }

    async fn fetch_open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        self.signed_request(
            Method::GET,
            "/api/v3/openOrders",
            vec![("symbol", symbol.to_string())],
        )
        .await
    }

    async fn fetch_order(&self, symbol: &str, order_id: u64) -> ExchangeResult<Order> {
        self.signed_request(
            Method::GET,
            "/api/v3/order",
            vec![
                ("symbol", symbol.to_string()),
                ("orderId", order_id.to_string()),
            ],
        )
        .await
    }

    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<Order> {
        let mut params = vec![
            ("symbol", request.symbol.clone()),
            ("side", request.side.as_str().to_string()),
            ("type", request.order_type.as_str().to_string()),
            ("quantity", request.quantity.clone()),
            ("newClientOrderId", request.client_order_id.clone()),
            ("newOrderRespType", "RESULT".to_string()),
        ];

        if request.order_type != OrderType::Market {
            params.push(("timeInForce", "GTC".to_string()));
            params.push(("price", request.price.clone()));
        }
        if let Some(stop_price) = &request.stop_price {
            params.push(("stopPrice", stop_price.clone()));
        }

        tracing::info!(
            symbol = %request.symbol,
            side = request.side.as_str(),
            order_type = request.order_type.as_str(),
            quantity = %request.quantity,
            price = %request.price,
            stop_price = ?request.stop_price,
            "Sending order"
        );

        let mut order: Order = self
            .signed_request(Method::POST, "/api/v3/order", params)
            .await?;

        // RESULT responses omit the stop price
        if order.stop_price == 0.0 {
            if let Some(stop) = request.stop_price.as_deref().and_then(|s| s.parse().ok()) {
                order.stop_price = stop;
            }
        }
        Ok(order)
    }

    async fn cancel_order(&self, symbol: &str, order_id: u64) -> ExchangeResult<()> {
        let _: Value = self
            .signed_request(
                Method::DELETE,
                "/api/v3/order",
                vec![
                    ("symbol", symbol.to_string()),
                    ("orderId", order_id.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_account_info(&self) -> ExchangeResult<AccountInfo> {
        self.signed_request(Method::GET, "/api/v3/account", vec![]).await
    }

    async fn fetch_symbol_info(&self, symbol: &str) -> ExchangeResult<SymbolInfo> {
        let info: ExchangeInfoResponse = self
            .public_get("/api/v3/exchangeInfo", vec![("symbol", symbol.to_string())])
            .await?;

        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .map(ExchangeSymbol::into_symbol_info)
            .ok_or_else(|| ExchangeError::Decode(format!("{} missing from exchange info", symbol)))
    }
}
