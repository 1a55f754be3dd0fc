//! 거래소 어댑터 trait 정의.
//!
//! 어댑터는 거래소 고유 형식의 데이터를 정규화된 도메인 타입으로 변환해 돌려줄 뿐,
//! 레지스트리를 직접 수정하지 않습니다. 재시도와 레지스트리 반영은
//! [`ExchangeSession`](crate::session::ExchangeSession)이 담당합니다.
//!
//! 지원하지 않는 기능은 [`ExchangeAdapter::capabilities`]에서 빠져 있어야 하며,
//! 기본 구현은 `ExchangeError::NotSupported`를 반환합니다.

use aggregator_core::{
    AvailableBalances, Candle, CompleteBalances, CurrencyFields, KlineRange, MarketTrade,
    MarketUpdate, OpenOrder, OrderBook, Timeframe, TradeRequest, TradeSubmission,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::mpsc;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 어댑터가 선언하는 기능.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CurrencyDefinitions,
    MarketDefinitions,
    MarketQuotes,
    Market24h,
    Klines,
    OrderBook,
    RecentTrades,
    OpenOrders,
    SubmitTrade,
    AvailableBalances,
    CompleteBalances,
    TickerStream,
}

impl Capability {
    /// 공개 API로 제공되는 기능.
    pub const PUBLIC: [Capability; 7] = [
        Capability::CurrencyDefinitions,
        Capability::MarketDefinitions,
        Capability::MarketQuotes,
        Capability::Market24h,
        Capability::Klines,
        Capability::OrderBook,
        Capability::RecentTrades,
    ];

    /// API 키가 필요한 기능.
    pub const PRIVATE: [Capability; 4] = [
        Capability::OpenOrders,
        Capability::SubmitTrade,
        Capability::AvailableBalances,
        Capability::CompleteBalances,
    ];

    /// API 키가 필요한 기능인지 확인.
    pub fn is_private(&self) -> bool {
        Self::PRIVATE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CurrencyDefinitions => "currency_definitions",
            Capability::MarketDefinitions => "market_definitions",
            Capability::MarketQuotes => "market_quotes",
            Capability::Market24h => "market_24h",
            Capability::Klines => "klines",
            Capability::OrderBook => "order_book",
            Capability::RecentTrades => "recent_trades",
            Capability::OpenOrders => "open_orders",
            Capability::SubmitTrade => "submit_trade",
            Capability::AvailableBalances => "available_balances",
            Capability::CompleteBalances => "complete_balances",
            Capability::TickerStream => "ticker_stream",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 선언된 기능 집합.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기능을 추가합니다.
    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// 여러 기능을 추가합니다.
    pub fn with_all(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.0.extend(capabilities);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 미지원 기능 에러를 생성합니다.
pub fn not_supported(exchange: &str, capability: Capability) -> ExchangeError {
    ExchangeError::NotSupported(format!("{} does not provide {}", exchange, capability))
}

/// 통합 거래소 어댑터 인터페이스.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 지원 기능 선언.
    fn capabilities(&self) -> CapabilitySet;

    /// 네이티브 캔들 간격 목록. 캔들을 지원하지 않으면 빈 슬라이스.
    fn native_intervals(&self) -> &[Timeframe] {
        &[]
    }

    // === 마켓 구조 ===

    /// 로컬 통화 코드 -> 통화 메타데이터.
    async fn fetch_currency_definitions(&self) -> ExchangeResult<HashMap<String, CurrencyFields>> {
        Err(not_supported(self.name(), Capability::CurrencyDefinitions))
    }

    /// 마켓별 정의 갱신 (로컬 코드 포함).
    async fn fetch_market_definitions(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        Err(not_supported(self.name(), Capability::MarketDefinitions))
    }

    // === 시세 ===

    /// 최우선 호가 갱신.
    async fn fetch_market_quotes(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        Err(not_supported(self.name(), Capability::MarketQuotes))
    }

    /// 24시간 통계 갱신.
    async fn fetch_market_24h(&self) -> ExchangeResult<Vec<MarketUpdate>> {
        Err(not_supported(self.name(), Capability::Market24h))
    }

    /// 네이티브 간격 캔들 조회 (시간 오름차순).
    async fn fetch_klines(
        &self,
        native_symbol: &str,
        interval: Timeframe,
        range: KlineRange,
    ) -> ExchangeResult<Vec<Candle>> {
        let _ = (native_symbol, interval, range);
        Err(not_supported(self.name(), Capability::Klines))
    }

    /// 호가창 스냅샷 (각 방향 최대 `depth` 단계).
    async fn fetch_order_book(&self, native_symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        let _ = (native_symbol, depth);
        Err(not_supported(self.name(), Capability::OrderBook))
    }

    /// 최근 마켓 체결.
    async fn fetch_recent_trades(&self, native_symbol: &str) -> ExchangeResult<Vec<MarketTrade>> {
        let _ = native_symbol;
        Err(not_supported(self.name(), Capability::RecentTrades))
    }

    // === 계좌 ===

    /// 사용자 미체결 주문.
    async fn fetch_open_orders(&self, native_symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        let _ = native_symbol;
        Err(not_supported(self.name(), Capability::OpenOrders))
    }

    /// 지정가 주문 제출.
    async fn submit_trade(&self, request: &TradeRequest) -> ExchangeResult<TradeSubmission> {
        let _ = request;
        Err(not_supported(self.name(), Capability::SubmitTrade))
    }

    /// 사용 가능 잔고.
    async fn fetch_available_balances(&self) -> ExchangeResult<AvailableBalances> {
        Err(not_supported(self.name(), Capability::AvailableBalances))
    }

    /// 사용 가능 + 주문 중 잔고.
    async fn fetch_complete_balances(&self) -> ExchangeResult<CompleteBalances> {
        Err(not_supported(self.name(), Capability::CompleteBalances))
    }

    // === 실시간 ===

    /// 전체 마켓 티커 스트림에 연결해 갱신 묶음을 `sink`로 보냅니다.
    ///
    /// 연결이 끊기면 `Ok(())`로 반환하며, 재연결은 호출자가 담당합니다.
    async fn stream_tickers(&self, sink: mpsc::Sender<Vec<MarketUpdate>>) -> ExchangeResult<()> {
        let _ = sink;
        Err(not_supported(self.name(), Capability::TickerStream))
    }
}
