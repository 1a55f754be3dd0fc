//! Binance 현물 REST 어댑터.
//!
//! 공개 API로 마켓 구조와 시세를 가져오고, API 키가 설정된 경우
//! HMAC-SHA256 서명 요청으로 잔고와 주문을 처리합니다.
//! 서명 요청의 타임스탬프는 서버 시각과의 차이로 보정합니다.

use aggregator_core::{
    increment_from_precision, AvailableBalances, BalanceBreakdown, Candle,
    CompleteBalances, CurrencyFields, ExchangeSettings, KlineRange, MarketFields, MarketTrade,
    MarketUpdate, OpenOrder, OrderBook, OrderBookLevel, Side, TimeInForce, Timeframe,
    TradeRequest, TradeSubmission, MIN_INCREMENT,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::traits::{Capability, CapabilitySet, ExchangeAdapter, ExchangeResult};
use crate::websocket::binance_ticker;
use crate::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

pub const EXCHANGE_NAME: &str = "binance";
pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// depth 엔드포인트가 허용하는 limit 값.
const DEPTH_LIMITS: [usize; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];
const MAX_KLINES: u32 = 1000;

// ============================================================================
// 설정
// ============================================================================

/// Binance 어댑터 설정.
///
/// `Debug` 구현은 API 키와 시크릿을 마스킹합니다.
#[derive(Clone)]
pub struct BinanceConfig {
    pub api_key: String,
    pub api_secret: String,
    pub rest_base_url: String,
    pub ws_base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("BinanceConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("rest_base_url", &self.rest_base_url)
            .field("ws_base_url", &self.ws_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            rest_base_url: DEFAULT_REST_URL.to_string(),
            ws_base_url: DEFAULT_WS_URL.to_string(),
            timeout_secs: 30,
            recv_window: 5000,
        }
    }
}

impl BinanceConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    /// 거래소 설정에서 생성합니다. URL이 없으면 메인넷 주소를 사용합니다.
    pub fn from_settings(settings: &ExchangeSettings) -> Self {
        let defaults = Self::default();
        Self {
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            rest_base_url: settings
                .rest_base_url
                .clone()
                .unwrap_or(defaults.rest_base_url),
            ws_base_url: settings.ws_base_url.clone().unwrap_or(defaults.ws_base_url),
            ..defaults
        }
    }

    pub fn with_rest_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url = url.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

fn default_quote_precision() -> u32 {
    8
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default = "default_quote_precision")]
    quote_precision: u32,
    #[serde(default)]
    filters: Vec<BinanceFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum BinanceFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { min_price: Decimal, tick_size: Decimal },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { min_qty: Decimal, step_size: Decimal },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBookTicker {
    symbol: String,
    bid_price: Decimal,
    bid_qty: Decimal,
    ask_price: Decimal,
    ask_qty: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    symbol: String,
    price_change_percent: Decimal,
    last_price: Decimal,
    bid_price: Decimal,
    bid_qty: Decimal,
    ask_price: Decimal,
    ask_qty: Decimal,
    high_price: Decimal,
    low_price: Decimal,
    volume: Decimal,
    quote_volume: Decimal,
    close_time: i64,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct BinanceKline(
    i64,     // 0: Open time
    Decimal, // 1: Open
    Decimal, // 2: High
    Decimal, // 3: Low
    Decimal, // 4: Close
    Decimal, // 5: Volume
    i64,     // 6: Close time
    Decimal, // 7: Quote asset volume
    i64,     // 8: Number of trades
    Decimal, // 9: Taker buy base asset volume
    Decimal, // 10: Taker buy quote asset volume
    String,  // 11: Ignore
);

#[derive(Debug, Deserialize)]
struct BinanceDepth {
    bids: Vec<[Decimal; 2]>,
    asks: Vec<[Decimal; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTrade {
    id: i64,
    price: Decimal,
    qty: Decimal,
    time: i64,
    is_buyer_maker: bool,
}

#[derive(Debug, Deserialize)]
struct BinanceAccountBalance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
struct BinanceAccountInfo {
    balances: Vec<BinanceAccountBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOpenOrder {
    order_id: i64,
    price: Decimal,
    orig_qty: Decimal,
    executed_qty: Decimal,
    side: String,
    time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    client_order_id: String,
    executed_qty: Decimal,
}

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

// ============================================================================
// 변환
// ============================================================================

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_side(side: &str) -> Side {
    if side.eq_ignore_ascii_case("SELL") {
        Side::Sell
    } else {
        Side::Buy
    }
}

/// 심볼 정보를 마켓 정의 갱신으로 변환합니다.
///
/// Binance의 quote 자산이 기준 통화, base 자산이 거래 통화입니다.
fn market_definition(info: &BinanceSymbolInfo) -> MarketUpdate {
    let is_active = info.status == "TRADING";
    let mut fields = MarketFields {
        base_min_amount: Some(Decimal::ZERO),
        base_increment: Some(increment_from_precision(info.quote_precision)),
        is_active: Some(is_active),
        is_restricted: Some(!is_active),
        ..Default::default()
    };
    for filter in &info.filters {
        match filter {
            BinanceFilter::Price {
                min_price,
                tick_size,
            } => {
                fields.price_min = Some(*min_price);
                fields.price_increment = Some(*tick_size);
            }
            BinanceFilter::LotSize { min_qty, step_size } => {
                fields.curr_min_amount = Some(*min_qty);
                fields.curr_increment = Some(*step_size);
            }
            BinanceFilter::Other => {}
        }
    }
    MarketUpdate::definition(&info.symbol, &info.quote_asset, &info.base_asset, fields)
}

/// 심볼 목록에 등장하는 모든 자산을 통화로 정의합니다.
fn currency_definitions(info: &BinanceExchangeInfo) -> HashMap<String, CurrencyFields> {
    let mut currencies = HashMap::new();
    for symbol in &info.symbols {
        for asset in [&symbol.base_asset, &symbol.quote_asset] {
            currencies
                .entry(asset.clone())
                .or_insert_with(|| CurrencyFields {
                    name: Some(asset.clone()),
                    precision: Some(MIN_INCREMENT),
                    ..Default::default()
                });
        }
    }
    currencies
}

fn quote_update(ticker: &BinanceBookTicker) -> MarketUpdate {
    MarketUpdate::for_symbol(
        &ticker.symbol,
        MarketFields::quote(
            ticker.bid_price,
            ticker.bid_qty,
            ticker.ask_price,
            ticker.ask_qty,
        ),
    )
}

fn stats_update(ticker: &BinanceTicker24h) -> MarketUpdate {
    let fields = MarketFields {
        base_volume: Some(ticker.quote_volume),
        curr_volume: Some(ticker.volume),
        high_24h: Some(ticker.high_price),
        low_24h: Some(ticker.low_price),
        percent_move_24h: Some(ticker.price_change_percent),
        last_price: Some(ticker.last_price),
        timestamp: Some(from_millis(ticker.close_time)),
        ..MarketFields::quote(
            ticker.bid_price,
            ticker.bid_qty,
            ticker.ask_price,
            ticker.ask_qty,
        )
    };
    MarketUpdate::for_symbol(&ticker.symbol, fields)
}

fn kline_to_candle(kline: &BinanceKline) -> Candle {
    Candle::new(
        kline.0 / 1000,
        kline.1, kline.2, kline.3, kline.4, kline.5, kline.7,
    )
}

fn to_levels(rows: &[[Decimal; 2]]) -> Vec<OrderBookLevel> {
    rows.iter()
        .map(|[price, qty]| OrderBookLevel::new(*price, *qty))
        .collect()
}

fn depth_limit(depth: usize) -> usize {
    DEPTH_LIMITS
        .iter()
        .copied()
        .find(|limit| *limit >= depth)
        .unwrap_or(DEPTH_LIMITS[DEPTH_LIMITS.len() - 1])
}

// ============================================================================
// Binance 어댑터
// ============================================================================

/// Binance 현물 어댑터.
pub struct BinanceAdapter {
    config: BinanceConfig,
    client: Client,
    /// 서버 시각 - 로컬 시각 (밀리초)
    time_offset_ms: AtomicI64,
    time_synced: AtomicBool,
}

impl BinanceAdapter {
    /// 새 어댑터 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            time_offset_ms: AtomicI64::new(0),
            time_synced: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    /// 보정된 현재 타임스탬프 (밀리초).
    fn timestamp_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.time_offset_ms.load(Ordering::Relaxed)
    }

    /// 서버 시각을 조회해 타임스탬프 보정값을 갱신합니다.
    pub async fn sync_server_time(&self) -> ExchangeResult<i64> {
        let time: BinanceServerTime = self.public_get("/api/v3/time", &[]).await?;
        let offset = time.server_time - Utc::now().timestamp_millis();
        self.time_offset_ms.store(offset, Ordering::Relaxed);
        self.time_synced.store(true, Ordering::Relaxed);
        debug!(offset_ms = offset, "Binance server time synchronized");
        Ok(offset)
    }

    async fn ensure_time_synced(&self) -> ExchangeResult<()> {
        if !self.time_synced.load(Ordering::Relaxed) {
            self.sync_server_time().await?;
        }
        Ok(())
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    fn sign(&self, query: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Unauthorized(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn signed_query(&self, params: &[(&str, String)]) -> ExchangeResult<String> {
        let mut all_params = params.to_vec();
        all_params.push(("recvWindow", self.config.recv_window.to_string()));
        all_params.push(("timestamp", self.timestamp_ms().to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    /// 공개 API 요청.
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url, endpoint);
        let query = Self::build_query(params);
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", full_url);

        let response = self.client.get(&full_url).send().await?;
        self.handle_response(response).await
    }

    /// 서명된 GET 요청.
    async fn signed_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        self.ensure_time_synced().await?;
        let url = format!("{}{}", self.config.rest_base_url, endpoint);
        let full_url = format!("{}?{}", url, self.signed_query(params)?);

        debug!("GET (signed) {}", endpoint);

        let response = self
            .client
            .get(&full_url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// 서명된 POST 요청.
    async fn signed_post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        self.ensure_time_synced().await?;
        let url = format!("{}{}", self.config.rest_base_url, endpoint);
        let body = self.signed_query(params)?;

        debug!("POST (signed) {}", endpoint);

        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// API 응답 처리.
    ///
    /// 성공 상태라도 `{code, msg}` 본문이면 에러로 취급합니다.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        if let Ok(error) = serde_json::from_str::<BinanceError>(&body) {
            return Err(self.map_error_code(error.code, &error.msg));
        }
        if !status.is_success() {
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(&self, code: i32, msg: &str) -> ExchangeError {
        match code {
            -1003 => ExchangeError::RateLimited,
            -1002 | -2014 | -2015 => ExchangeError::Unauthorized(msg.to_string()),
            -1021 => {
                // 타임스탬프가 수신 윈도우를 벗어남: 다음 요청에서 다시 동기화
                self.time_synced.store(false, Ordering::Relaxed);
                ExchangeError::ApiError {
                    code,
                    message: msg.to_string(),
                }
            }
            -1121 => ExchangeError::SymbolNotFound(msg.to_string()),
            -2010 => ExchangeError::OrderRejected(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    async fn exchange_info(&self) -> ExchangeResult<BinanceExchangeInfo> {
        self.public_get("/api/v3/exchangeInfo", &[]).await
    }

    async fn account_balances(&self) -> ExchangeResult<Vec<BinanceAccountBalance>> {
        let account: BinanceAccountInfo = self.signed_get("/api/v3/account", &[]).await?;
        Ok(account.balances)
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        EXCHANGE_NAME
    }

    fn capabilities(&self) -> CapabilitySet {
        let caps = CapabilitySet::new()
            .with_all(Capability::PUBLIC)
            .with(Capability::TickerStream);
        if self.config.has_credentials() {
            caps.with_all(Capability::PRIVATE)
        } else {
            caps
        }
    }

    fn native_intervals(&self) -> &[Timeframe] {
        &Timeframe::ALL
    }

    async fn fetch_currency_definitions(&self) -> ExchangeResult<HashMap<String, CurrencyFields>> {
        let info = self.exchange_info().await?;
        Ok(currency_definitions(&info))
    }

    async fn fetch_market_definitions(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        let info = self.exchange_info().await?;
        info!(markets = info.symbols.len(), "Binance exchange info loaded");
        Ok(info.symbols.iter().map(market_definition).collect())
    }

    async fn fetch_market_quotes(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        let tickers: Vec<BinanceBookTicker> = self.public_get("/api/v3/ticker/bookTicker", &[]).await?;
        Ok(tickers.iter().map(quote_update).collect())
    }

    async fn fetch_market_24h(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        let tickers: Vec<BinanceTicker24h> = self.public_get("/api/v3/ticker/24hr", &[]).await?;
        Ok(tickers.iter().map(stats_update).collect())
    }

    async fn fetch_klines(
        &self,
        native_symbol: &str,
        interval: Timeframe,
        range: KlineRange,
    ) -> ExchangeResult<Vec<Candle>> {
        let mut params = vec![
            ("symbol", native_symbol.to_string()),
            ("interval", interval.to_binance_interval().to_string()),
            ("limit", range.limit.unwrap_or(MAX_KLINES).min(MAX_KLINES).to_string()),
        ];
        // 포화된 시작 시각은 epoch으로 고정합니다.
        if let Some(start) = range.start {
            params.push(("startTime", start.max(0).saturating_mul(1000).to_string()));
        }
        if let Some(end) = range.end {
            params.push(("endTime", end.max(0).saturating_mul(1000).to_string()));
        }

        let klines: Vec<BinanceKline> = self.public_get("/api/v3/klines", &params).await?;
        Ok(klines.iter().map(kline_to_candle).collect())
    }

    async fn fetch_order_book(&self, native_symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        let params = [
            ("symbol", native_symbol.to_string()),
            ("limit", depth_limit(depth).to_string()),
        ];
        let raw: BinanceDepth = self.public_get("/api/v3/depth", &params).await?;
        let mut book = OrderBook::from_levels(to_levels(&raw.bids), to_levels(&raw.asks), depth);
        // Binance 마켓은 호가가 비어도 거래 가능 상태로 취급합니다.
        book.tradeable = true;
        Ok(book)
    }

    async fn fetch_recent_trades(&self, native_symbol: &str) -> ExchangeResult<Vec<MarketTrade>> {
        let params = [("symbol", native_symbol.to_string()), ("limit", "500".to_string())];
        let trades: Vec<BinanceTrade> = self.public_get("/api/v3/trades", &params).await?;

        Ok(trades
            .iter()
            .map(|t| {
                MarketTrade {
                    trade_id: t.id.to_string(),
                    side: if t.is_buyer_maker { Side::Buy } else { Side::Sell },
                    time: from_millis(t.time),
                    price: t.price,
                    amount: t.qty,
                    total: t.price * t.qty,
                }
            })
            .filter(MarketTrade::is_valid)
            .collect())
    }

    async fn fetch_open_orders(&self, native_symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let params = [("symbol", native_symbol.to_string())];
        let orders: Vec<BinanceOpenOrder> = self.signed_get("/api/v3/openOrders", &params).await?;

        Ok(orders
            .iter()
            .map(|o| {
                OpenOrder {
                    order_id: o.order_id.to_string(),
                    side: parse_side(&o.side),
                    opened_at: from_millis(o.time),
                    price: o.price,
                    amount: o.orig_qty,
                    total: o.price * o.orig_qty,
                    amount_remaining: o.orig_qty - o.executed_qty,
                }
            })
            .collect())
    }

    async fn submit_trade(&self, request: &TradeRequest) -> ExchangeResult<TradeSubmission> {
        let time_in_force = match request.time_in_force {
            TimeInForce::GoodTillCancelled => "GTC",
            TimeInForce::ImmediateOrCancel => "IOC",
        };
        let params = [
            ("symbol", request.native_symbol.clone()),
            ("side", request.side.to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", time_in_force.to_string()),
            ("quantity", format!("{:.8}", request.amount)),
            ("price", format!("{:.8}", request.price)),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        let response: BinanceOrderResponse = self.signed_post("/api/v3/order", &params).await?;

        Ok(TradeSubmission {
            filled_amount: response.executed_qty,
            order_id: response.client_order_id,
        })
    }

    async fn fetch_available_balances(&self) -> ExchangeResult<AvailableBalances> {
        let balances = self.account_balances().await?;
        Ok(balances
            .into_iter()
            .map(|b| (b.asset, b.free))
            .collect())
    }

    async fn fetch_complete_balances(&self) -> ExchangeResult<CompleteBalances> {
        let balances = self.account_balances().await?;
        Ok(balances
            .into_iter()
            .map(|b| {
                let breakdown = BalanceBreakdown::from_locked(b.free, b.locked);
                (b.asset, breakdown)
            })
            .collect())
    }

    async fn stream_tickers(&self, sink: mpsc::Sender<Vec<MarketUpdate>>) -> ExchangeResult<()> {
        binance_ticker::stream_all_tickers(&self.config.ws_base_url, sink).await
    }
}
