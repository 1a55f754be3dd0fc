//! Bittrex REST 어댑터 (API v1.1).
//!
//! 모든 응답은 `{success, message, result}` 형태로 감싸져 있으며
//! `success == false`는 API 에러입니다. 캔들은 v2.0 공개 엔드포인트에서 가져옵니다.
//! 비공개 요청은 전체 URL을 HMAC-SHA512로 서명해 `apisign` 헤더로 보냅니다.

use aggregator_core::{
    AvailableBalances, BalanceBreakdown, Candle, CompleteBalances, CurrencyFields,
    ExchangeSettings, KlineRange, MarketFields, MarketTrade, MarketUpdate, OpenOrder, OrderBook,
    OrderBookLevel, Side, TimeInForce, Timeframe, TradeRequest, TradeSubmission, MIN_INCREMENT,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha512;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::traits::{Capability, CapabilitySet, ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

type HmacSha512 = Hmac<Sha512>;

pub const EXCHANGE_NAME: &str = "bittrex";
pub const DEFAULT_REST_URL: &str = "https://bittrex.com/api/v1.1";
pub const DEFAULT_TICKS_URL: &str = "https://bittrex.com/Api/v2.0";

/// Bittrex가 제공하는 캔들 간격.
const NATIVE_INTERVALS: [Timeframe; 5] = [
    Timeframe::M1,
    Timeframe::M5,
    Timeframe::M30,
    Timeframe::H1,
    Timeframe::D1,
];

// ============================================================================
// 설정
// ============================================================================

/// Bittrex 어댑터 설정.
#[derive(Clone)]
pub struct BittrexConfig {
    pub api_key: String,
    pub api_secret: String,
    pub rest_base_url: String,
    pub ticks_base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// IOC 주문 제출 후 미체결 확인까지 대기 시간
    pub ioc_settle_delay: Duration,
}

impl fmt::Debug for BittrexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BittrexConfig")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "***REDACTED***" })
            .field("api_secret", &"***REDACTED***")
            .field("rest_base_url", &self.rest_base_url)
            .field("ticks_base_url", &self.ticks_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for BittrexConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            rest_base_url: DEFAULT_REST_URL.to_string(),
            ticks_base_url: DEFAULT_TICKS_URL.to_string(),
            timeout_secs: 30,
            ioc_settle_delay: Duration::from_millis(500),
        }
    }
}

impl BittrexConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    pub fn from_settings(settings: &ExchangeSettings) -> Self {
        let defaults = Self::default();
        Self {
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            rest_base_url: settings
                .rest_base_url
                .clone()
                .unwrap_or(defaults.rest_base_url),
            ..defaults
        }
    }

    /// REST와 캔들 엔드포인트를 같은 서버로 지정합니다.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.rest_base_url = url.clone();
        self.ticks_base_url = url;
        self
    }

    pub fn with_ioc_settle_delay(mut self, delay: Duration) -> Self {
        self.ioc_settle_delay = delay;
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
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexCurrency {
    currency: String,
    currency_long: String,
    #[serde(default)]
    min_confirmation: u32,
    #[serde(default)]
    tx_fee: Option<Decimal>,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    is_restricted: bool,
    #[serde(default)]
    base_address: Option<String>,
    #[serde(default)]
    notice: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexMarket {
    market_name: String,
    base_currency: String,
    market_currency: String,
    #[serde(default)]
    min_trade_size: Option<Decimal>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    is_restricted: Option<bool>,
    #[serde(default)]
    notice: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexMarketSummary {
    market_name: String,
    high: Option<Decimal>,
    low: Option<Decimal>,
    volume: Option<Decimal>,
    last: Option<Decimal>,
    base_volume: Option<Decimal>,
    time_stamp: Option<String>,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    prev_day: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexBookEntry {
    quantity: Decimal,
    rate: Decimal,
}

#[derive(Debug, Default, Deserialize)]
struct BittrexOrderBook {
    #[serde(default)]
    buy: Vec<BittrexBookEntry>,
    #[serde(default)]
    sell: Vec<BittrexBookEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexTrade {
    id: i64,
    time_stamp: String,
    #[serde(default)]
    quantity: Decimal,
    #[serde(default)]
    price: Decimal,
    #[serde(default)]
    total: Decimal,
    order_type: String,
}

#[derive(Debug, Deserialize)]
struct BittrexTick {
    #[serde(rename = "T")]
    time: String,
    #[serde(rename = "O")]
    open: Decimal,
    #[serde(rename = "H")]
    high: Decimal,
    #[serde(rename = "L")]
    low: Decimal,
    #[serde(rename = "C")]
    close: Decimal,
    #[serde(rename = "V")]
    volume: Decimal,
    #[serde(rename = "BV")]
    base_volume: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexBalance {
    currency: String,
    #[serde(default)]
    balance: Option<Decimal>,
    #[serde(default)]
    available: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BittrexOpenOrder {
    order_uuid: String,
    order_type: String,
    opened: String,
    #[serde(default)]
    limit: Decimal,
    #[serde(default)]
    quantity: Decimal,
    #[serde(default)]
    price: Decimal,
    #[serde(default)]
    quantity_remaining: Decimal,
}

#[derive(Debug, Deserialize)]
struct BittrexOrderUuid {
    uuid: String,
}

// ============================================================================
// 변환
// ============================================================================

/// `2014-07-09T07:19:30.15` 형식을 파싱합니다. 소수점 이하 초는 버립니다.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.split('.').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn currency_definition(currency: &BittrexCurrency) -> CurrencyFields {
    let enabled = currency.is_active && !currency.is_restricted;
    CurrencyFields {
        name: Some(currency.currency_long.clone()),
        deposit_enabled: Some(enabled),
        withdrawal_enabled: Some(enabled),
        notice: Some(currency.notice.clone().unwrap_or_default()),
        base_address: Some(currency.base_address.clone().unwrap_or_default()),
        min_confirmations: Some(currency.min_confirmation),
        withdrawal_fee: Some(currency.tx_fee.unwrap_or_default()),
        withdrawal_min_amount: Some(Decimal::ZERO),
        precision: Some(MIN_INCREMENT),
    }
}

fn market_definition(market: &BittrexMarket) -> MarketUpdate {
    let fields = MarketFields {
        base_min_amount: Some(Decimal::ZERO),
        base_increment: Some(MIN_INCREMENT),
        curr_min_amount: Some(market.min_trade_size.unwrap_or_default()),
        curr_increment: Some(MIN_INCREMENT),
        price_min: Some(Decimal::ZERO),
        price_increment: Some(MIN_INCREMENT),
        is_active: Some(market.is_active.unwrap_or(false)),
        is_restricted: Some(market.is_restricted.unwrap_or(false)),
        notice: Some(market.notice.clone().unwrap_or_default()),
        created: market.created.as_deref().and_then(parse_timestamp),
        logo_url: market.logo_url.clone(),
        ..Default::default()
    };
    MarketUpdate::definition(
        &market.market_name,
        &market.base_currency,
        &market.market_currency,
        fields,
    )
}

/// 전일 대비 호가 중간값의 변동률 (%). 전일 값이 없으면 0.
fn percent_move(summary: &BittrexMarketSummary) -> Decimal {
    match (summary.bid, summary.ask, summary.prev_day) {
        (Some(bid), Some(ask), Some(prev)) if prev > Decimal::ZERO => {
            Decimal::ONE_HUNDRED * ((bid + ask) / (Decimal::TWO * prev) - Decimal::ONE)
        }
        _ => Decimal::ZERO,
    }
}

fn summary_update(summary: &BittrexMarketSummary) -> MarketUpdate {
    let fields = MarketFields {
        base_volume: summary.base_volume,
        curr_volume: summary.volume,
        best_bid: summary.bid,
        best_ask: summary.ask,
        high_24h: summary.high,
        low_24h: summary.low,
        percent_move_24h: Some(percent_move(summary)),
        last_price: summary.last,
        timestamp: summary.time_stamp.as_deref().and_then(parse_timestamp),
        ..Default::default()
    };
    MarketUpdate::for_symbol(&summary.market_name, fields)
}

fn to_levels(entries: &[BittrexBookEntry]) -> Vec<OrderBookLevel> {
    entries
        .iter()
        .map(|e| OrderBookLevel::new(e.rate, e.quantity))
        .collect()
}

fn tick_to_candle(tick: &BittrexTick) -> Option<Candle> {
    let open_time = parse_timestamp(&tick.time)?.timestamp();
    Some(Candle::new(
        open_time,
        tick.open,
        tick.high,
        tick.low,
        tick.close,
        tick.volume,
        tick.base_volume,
    ))
}

// ============================================================================
// Bittrex 어댑터
// ============================================================================

/// Bittrex 어댑터.
pub struct BittrexAdapter {
    config: BittrexConfig,
    client: Client,
}

impl BittrexAdapter {
    /// 새 어댑터 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BittrexConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &BittrexConfig {
        &self.config
    }

    /// HMAC-SHA512로 요청 URL 서명.
    fn sign(&self, url: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha512::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Unauthorized(e.to_string()))?;
        mac.update(url.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> ExchangeResult<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    /// 공개 API 요청 (v1.1).
    async fn public_get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.rest_base_url, path);
        self.get(&url).await
    }

    /// 비공개 API 요청.
    ///
    /// `extra`는 `&key=value` 형식의 추가 파라미터입니다.
    async fn private_get<T: for<'de> Deserialize<'de>>(
        &self,
        command: &str,
        extra: &str,
    ) -> ExchangeResult<T> {
        let nonce = Utc::now().timestamp_millis();
        let url = format!(
            "{}{}?apikey={}&nonce={}{}",
            self.config.rest_base_url, command, self.config.api_key, nonce, extra
        );
        let signature = self.sign(&url)?;

        debug!("GET (signed) {}", command);

        let response = self
            .client
            .get(&url)
            .header("apisign", signature)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// 응답 봉투를 풀어 결과를 반환합니다.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ExchangeError::ApiError {
                    code: status.as_u16() as i32,
                    message: body,
                })
            }
            Err(e) => return Err(ExchangeError::ParseError(e.to_string())),
        };

        if !envelope.success {
            return Err(Self::map_error_message(envelope.message));
        }
        match envelope.result {
            Some(result) => Ok(result),
            // 취소 같은 명령은 `result: null`을 돌려줍니다.
            None => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| ExchangeError::ParseError("missing result".to_string())),
        }
    }

    fn map_error_message(message: String) -> ExchangeError {
        match message.as_str() {
            "APIKEY_INVALID" | "INVALID_SIGNATURE" | "APIKEY_NOT_PROVIDED" => {
                ExchangeError::Unauthorized(message)
            }
            "INVALID_MARKET" => ExchangeError::SymbolNotFound(message),
            "INSUFFICIENT_FUNDS" | "MIN_TRADE_REQUIREMENT_NOT_MET" | "DUST_TRADE_DISALLOWED_MIN_VALUE" => {
                ExchangeError::OrderRejected(message)
            }
            _ => ExchangeError::ApiError { code: 0, message },
        }
    }

    async fn raw_open_orders(&self, native_symbol: &str) -> ExchangeResult<Vec<BittrexOpenOrder>> {
        self.private_get("/market/getopenorders", &format!("&market={}", native_symbol))
            .await
    }

    async fn raw_balances(&self) -> ExchangeResult<Vec<BittrexBalance>> {
        self.private_get("/account/getbalances", "").await
    }

    async fn cancel_order(&self, uuid: &str) -> ExchangeResult<()> {
        let _: serde_json::Value = self
            .private_get("/market/cancel", &format!("&uuid={}", uuid))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExchangeAdapter for BittrexAdapter {
    fn name(&self) -> &str {
        EXCHANGE_NAME
    }

    fn capabilities(&self) -> CapabilitySet {
        let caps = CapabilitySet::new().with_all(Capability::PUBLIC);
        if self.config.has_credentials() {
            caps.with_all(Capability::PRIVATE)
        } else {
            caps
        }
    }

    fn native_intervals(&self) -> &[Timeframe] {
        &NATIVE_INTERVALS
    }

    async fn fetch_currency_definitions(&self) -> ExchangeResult<HashMap<String, CurrencyFields>> {
        let currencies: Vec<BittrexCurrency> = self.public_get("/public/getcurrencies").await?;
        Ok(currencies
            .iter()
            .map(|c| (c.currency.clone(), currency_definition(c)))
            .collect())
    }

    async fn fetch_market_definitions(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        let markets: Vec<BittrexMarket> = self.public_get("/public/getmarkets").await?;
        info!(markets = markets.len(), "Bittrex markets loaded");
        Ok(markets.iter().map(market_definition).collect())
    }

    async fn fetch_market_quotes(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        let summaries: Vec<BittrexMarketSummary> =
            self.public_get("/public/getmarketsummaries").await?;
        Ok(summaries.iter().map(summary_update).collect())
    }

    async fn fetch_market_24h(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        // 24시간 통계는 시세와 같은 요약 엔드포인트에서 제공됩니다.
        self.fetch_market_quotes().await
    }

    async fn fetch_klines(
        &self,
        native_symbol: &str,
        interval: Timeframe,
        range: KlineRange,
    ) -> ExchangeResult<Vec<Candle>> {
        let Some(tick_interval) = interval.to_bittrex_interval() else {
            return Err(ExchangeError::NotSupported(format!(
                "bittrex has no {} candles",
                interval
            )));
        };
        let url = format!(
            "{}/pub/market/GetTicks?marketName={}&tickInterval={}",
            self.config.ticks_base_url, native_symbol, tick_interval
        );
        let ticks: Vec<BittrexTick> = self.get(&url).await?;

        let mut candles: Vec<Candle> = ticks.iter().filter_map(tick_to_candle).collect();
        candles.retain(|c| {
            range.start.map_or(true, |start| c.open_time >= start)
                && range.end.map_or(true, |end| c.open_time <= end)
        });
        if let Some(limit) = range.limit {
            let excess = candles.len().saturating_sub(limit as usize);
            candles.drain(..excess);
        }
        Ok(candles)
    }

    async fn fetch_order_book(&self, native_symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        let raw: BittrexOrderBook = self
            .public_get(&format!("/public/getorderbook?market={}&type=both", native_symbol))
            .await?;
        Ok(OrderBook::from_levels(to_levels(&raw.buy), to_levels(&raw.sell), depth))
    }

    async fn fetch_recent_trades(&self, native_symbol: &str) -> ExchangeResult<Vec<MarketTrade>> {
        let trades: Vec<BittrexTrade> = self
            .public_get(&format!("/public/getmarkethistory?market={}", native_symbol))
            .await?;

        Ok(trades
            .iter()
            .filter_map(|t| {
                let Some(time) = parse_timestamp(&t.time_stamp) else {
                    warn!(trade_id = t.id, "Skipping trade with invalid timestamp");
                    return None;
                };
                Some(MarketTrade {
                    trade_id: t.id.to_string(),
                    side: if t.order_type == "BUY" { Side::Buy } else { Side::Sell },
                    time,
                    price: t.price,
                    amount: t.quantity,
                    total: t.total,
                })
            })
            .filter(MarketTrade::is_valid)
            .collect())
    }

    async fn fetch_open_orders(&self, native_symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let orders = self.raw_open_orders(native_symbol).await?;
        Ok(orders
            .into_iter()
            .map(|o| OpenOrder {
                side: if o.order_type == "LIMIT_BUY" { Side::Buy } else { Side::Sell },
                opened_at: parse_timestamp(&o.opened).unwrap_or_default(),
                order_id: o.order_uuid,
                price: o.limit,
                amount: o.quantity,
                total: o.price,
                amount_remaining: o.quantity_remaining,
            })
            .collect())
    }

    async fn submit_trade(&self, request: &TradeRequest) -> ExchangeResult<TradeSubmission> {
        let command = match request.side {
            Side::Buy => "/market/buylimit",
            Side::Sell => "/market/selllimit",
        };
        let extra = format!(
            "&market={}&quantity={:.8}&rate={:.8}",
            request.native_symbol, request.amount, request.price
        );
        let order: BittrexOrderUuid = self.private_get(command, &extra).await?;

        let mut filled_amount = request.amount;
        if request.time_in_force == TimeInForce::ImmediateOrCancel {
            tokio::time::sleep(self.config.ioc_settle_delay).await;
            let open = self.raw_open_orders(&request.native_symbol).await?;
            if let Some(resting) = open.iter().find(|o| o.order_uuid == order.uuid) {
                self.cancel_order(&order.uuid).await?;
                filled_amount = resting.quantity - resting.quantity_remaining;
                info!(
                    order_id = %order.uuid,
                    filled = %filled_amount,
                    "Cancelled unfilled remainder of IOC order"
                );
            }
        }

        Ok(TradeSubmission {
            filled_amount,
            order_id: order.uuid,
        })
    }

    async fn fetch_available_balances(&self) -> ExchangeResult<AvailableBalances> {
        let balances = self.raw_balances().await?;
        Ok(balances
            .into_iter()
            .map(|b| (b.currency, b.available.unwrap_or_default()))
            .collect())
    }

    async fn fetch_complete_balances(&self) -> ExchangeResult<CompleteBalances> {
        let balances = self.raw_balances().await?;
        Ok(balances
            .into_iter()
            .map(|b| {
                let breakdown = BalanceBreakdown::from_total(
                    b.available.unwrap_or_default(),
                    b.balance.unwrap_or_default(),
                );
                (b.currency, breakdown)
            })
            .collect())
    }
}
