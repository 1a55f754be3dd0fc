//! 거래소별 세션.
//!
//! 세션은 어댑터 하나와 그 어댑터가 쓰는 마켓 레지스트리, 에러 버짓을 묶어 소유합니다.
//! 모든 네트워크 호출은 [`retry_within_budget`] 루프를 거치며, 버짓이 소진되면
//! 빈 결과를 돌려주고 마지막 에러는 [`ExchangeSession::error_state`]로 확인합니다.
//!
//! 어댑터가 선언하지 않은 기능을 호출하면 버짓과 무관하게
//! `ExchangeError::NotSupported`가 반환됩니다.

use aggregator_core::{
    resample, select_native_interval, AvailableBalances, Candle, CompleteBalances, ErrorBudget,
    ErrorState, KlineRange, MarketRegistry, MarketTrade, MarketUpdate, OpenOrder, OrderBook,
    Quantity, TradeRequest, TradeSubmission,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::retry::{retry_within_budget, with_retry, RetryConfig};
use crate::traits::{not_supported, Capability, CapabilitySet, ExchangeAdapter, ExchangeResult};

/// 티커 스트림 채널 버퍼 크기.
const TICKER_CHANNEL_CAPACITY: usize = 64;

/// 어댑터 하나에 대한 세션.
pub struct ExchangeSession {
    adapter: Arc<dyn ExchangeAdapter>,
    registry: Arc<MarketRegistry>,
    capabilities: CapabilitySet,
    budget: ErrorBudget,
    retry: RetryConfig,
    /// 작업별 마지막 성공 시각
    last_runs: RwLock<HashMap<&'static str, DateTime<Utc>>>,
    /// 마켓별 최근 체결 캐시
    recent_trades: RwLock<HashMap<String, Vec<MarketTrade>>>,
    /// 마켓별 미체결 주문 캐시
    open_orders: RwLock<HashMap<String, Vec<OpenOrder>>>,
    /// 정규 코드 기준 사용 가능 잔고 캐시
    available_balances: RwLock<Option<AvailableBalances>>,
}

impl ExchangeSession {
    pub fn new(
        adapter: Arc<dyn ExchangeAdapter>,
        registry: Arc<MarketRegistry>,
        budget: ErrorBudget,
        retry: RetryConfig,
    ) -> Self {
        let capabilities = adapter.capabilities();
        Self {
            adapter,
            registry,
            capabilities,
            budget,
            retry,
            last_runs: RwLock::new(HashMap::new()),
            recent_trades: RwLock::new(HashMap::new()),
            open_orders: RwLock::new(HashMap::new()),
            available_balances: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub fn registry(&self) -> &Arc<MarketRegistry> {
        &self.registry
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// 에러 버짓의 현재 상태.
    pub fn error_state(&self) -> ErrorState {
        self.budget.state()
    }

    /// 작업의 마지막 성공 시각.
    pub fn last_run(&self, operation: &str) -> Option<DateTime<Utc>> {
        self.last_runs.read().unwrap().get(operation).copied()
    }

    fn require(&self, capability: Capability) -> ExchangeResult<()> {
        if self.capabilities.contains(capability) {
            return Ok(());
        }
        error!(
            exchange = %self.name(),
            capability = %capability,
            "Capability not declared by adapter"
        );
        Err(not_supported(self.name(), capability))
    }

    fn mark_run(&self, operation: &'static str) {
        self.last_runs.write().unwrap().insert(operation, Utc::now());
    }

    // ==================== 레지스트리 갱신 ====================

    /// 통화 정의를 가져와 레지스트리에 병합합니다.
    ///
    /// 임시 키에서 새로 해석된 마켓 수를 반환합니다.
    pub async fn update_currency_definitions(&self) -> ExchangeResult<usize> {
        const OP: &str = "currency_definitions";
        self.require(Capability::CurrencyDefinitions)?;

        let adapter = &self.adapter;
        let Some(definitions) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_currency_definitions()
        })
        .await?
        else {
            return Ok(0);
        };

        let resolved = self.registry.update_currency_definitions(&definitions);
        self.mark_run(OP);
        info!(
            exchange = %self.name(),
            currencies = definitions.len(),
            resolved,
            "Currency definitions updated"
        );
        Ok(resolved)
    }

    /// 마켓 정의를 가져와 레지스트리에 반영합니다.
    pub async fn update_market_definitions(&self) -> ExchangeResult<usize> {
        const OP: &str = "market_definitions";
        self.require(Capability::MarketDefinitions)?;

        let adapter = &self.adapter;
        let Some(updates) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_market_definitions()
        })
        .await?
        else {
            return Ok(0);
        };

        let applied = self.apply_market_updates(&updates);
        self.mark_run(OP);
        info!(
            exchange = %self.name(),
            markets = applied,
            active = self.registry.active_count(),
            "Market definitions updated"
        );
        Ok(applied)
    }

    /// 최우선 호가를 갱신합니다.
    pub async fn update_market_quotes(&self) -> ExchangeResult<usize> {
        const OP: &str = "market_quotes";
        self.require(Capability::MarketQuotes)?;

        let adapter = &self.adapter;
        let Some(updates) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_market_quotes()
        })
        .await?
        else {
            return Ok(0);
        };

        let applied = self.apply_market_updates(&updates);
        self.mark_run(OP);
        debug!(exchange = %self.name(), markets = applied, "Market quotes updated");
        Ok(applied)
    }

    /// 24시간 통계를 갱신합니다.
    pub async fn update_market_24hrs(&self) -> ExchangeResult<usize> {
        const OP: &str = "market_24h";
        self.require(Capability::Market24h)?;

        let adapter = &self.adapter;
        let Some(updates) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_market_24h()
        })
        .await?
        else {
            return Ok(0);
        };

        let applied = self.apply_market_updates(&updates);
        self.mark_run(OP);
        debug!(exchange = %self.name(), markets = applied, "24h statistics updated");
        Ok(applied)
    }

    /// 갱신 묶음을 받은 순서대로 레지스트리에 적용합니다.
    pub fn apply_market_updates(&self, updates: &[MarketUpdate]) -> usize {
        self.registry.apply_all(updates)
    }

    // ==================== 차트 ====================

    /// 네이티브 캔들을 가져와 요청 간격으로 변환합니다.
    ///
    /// 데이터가 없거나 버짓이 소진되면 빈 결과를 반환합니다.
    pub async fn load_chart_data(
        &self,
        native_symbol: &str,
        interval_minutes: u64,
        lookback_minutes: u64,
    ) -> ExchangeResult<Vec<Candle>> {
        const OP: &str = "klines";
        self.require(Capability::Klines)?;

        let Some(native) = select_native_interval(self.adapter.native_intervals(), interval_minutes)
        else {
            error!(exchange = %self.name(), "Klines declared without native intervals");
            return Err(not_supported(self.name(), Capability::Klines));
        };

        // 첫 버킷이 잘리지 않도록 요청 간격만큼 더 가져옵니다.
        let range = KlineRange::lookback(
            Utc::now().timestamp(),
            lookback_minutes.saturating_add(interval_minutes),
        );
        let adapter = &self.adapter;
        let Some(candles) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_klines(native_symbol, native, range)
        })
        .await?
        else {
            return Ok(Vec::new());
        };
        self.mark_run(OP);

        let output = resample(&candles, native.as_minutes(), interval_minutes, lookback_minutes);
        debug!(
            exchange = %self.name(),
            symbol = %native_symbol,
            native = %native,
            fetched = candles.len(),
            produced = output.len(),
            "Chart data loaded"
        );
        Ok(output)
    }

    /// 정규 코드 쌍으로 차트 데이터를 가져옵니다.
    ///
    /// 레지스트리에 없는 마켓은 빈 결과를 반환합니다.
    pub async fn load_chart_data_for(
        &self,
        base: &str,
        curr: &str,
        interval_minutes: u64,
        lookback_minutes: u64,
    ) -> ExchangeResult<Vec<Candle>> {
        let Some(symbol) = self.registry.get_market_symbol(base, curr) else {
            debug!(exchange = %self.name(), base, curr, "No market for chart request");
            return Ok(Vec::new());
        };
        self.load_chart_data(&symbol, interval_minutes, lookback_minutes)
            .await
    }

    // ==================== 시장 데이터 ====================

    /// 호가창 스냅샷. 버짓이 소진되면 거래 불가 상태의 빈 호가창.
    pub async fn order_book(&self, native_symbol: &str, depth: usize) -> ExchangeResult<OrderBook> {
        const OP: &str = "order_book";
        self.require(Capability::OrderBook)?;

        let adapter = &self.adapter;
        let Some(book) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_order_book(native_symbol, depth)
        })
        .await?
        else {
            return Ok(OrderBook::default());
        };
        self.mark_run(OP);
        Ok(book)
    }

    /// 최근 체결을 갱신하고 반환합니다.
    ///
    /// 버짓이 소진되면 이전 캐시를 유지하고 그 값을 반환합니다.
    pub async fn recent_market_trades(&self, native_symbol: &str) -> ExchangeResult<Vec<MarketTrade>> {
        const OP: &str = "recent_trades";
        self.require(Capability::RecentTrades)?;

        let adapter = &self.adapter;
        let fetched = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_recent_trades(native_symbol)
        })
        .await?;

        let mut cache = self.recent_trades.write().unwrap();
        if let Some(trades) = fetched {
            let trades: Vec<MarketTrade> = trades.into_iter().filter(|t| t.is_valid()).collect();
            cache.insert(native_symbol.to_string(), trades);
            self.mark_run(OP);
        }
        Ok(cache.get(native_symbol).cloned().unwrap_or_default())
    }

    /// 캐시된 최근 체결.
    pub fn cached_market_trades(&self, native_symbol: &str) -> Vec<MarketTrade> {
        self.recent_trades
            .read()
            .unwrap()
            .get(native_symbol)
            .cloned()
            .unwrap_or_default()
    }

    // ==================== 계좌 ====================

    /// 미체결 주문을 갱신하고 반환합니다.
    pub async fn open_user_orders(&self, native_symbol: &str) -> ExchangeResult<Vec<OpenOrder>> {
        const OP: &str = "open_orders";
        self.require(Capability::OpenOrders)?;

        let adapter = &self.adapter;
        let fetched = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_open_orders(native_symbol)
        })
        .await?;

        let mut cache = self.open_orders.write().unwrap();
        if let Some(orders) = fetched {
            cache.insert(native_symbol.to_string(), orders);
            self.mark_run(OP);
        }
        Ok(cache.get(native_symbol).cloned().unwrap_or_default())
    }

    /// 캐시된 미체결 주문.
    pub fn cached_open_orders(&self, native_symbol: &str) -> Vec<OpenOrder> {
        self.open_orders
            .read()
            .unwrap()
            .get(native_symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// 지정가 주문을 제출합니다.
    ///
    /// 버짓이 소진되면 체결 수량 0, 빈 주문 ID를 반환합니다.
    pub async fn submit_trade(&self, request: &TradeRequest) -> ExchangeResult<TradeSubmission> {
        const OP: &str = "submit_trade";
        self.require(Capability::SubmitTrade)?;

        info!(
            exchange = %self.name(),
            symbol = %request.native_symbol,
            side = %request.side,
            price = %request.price,
            amount = %request.amount,
            "Submitting order"
        );
        let adapter = &self.adapter;
        let submission = with_retry(&self.budget, &self.retry, OP, move || {
            adapter.submit_trade(request)
        })
        .await?;

        if !submission.order_id.is_empty() {
            self.mark_run(OP);
            info!(
                exchange = %self.name(),
                order_id = %submission.order_id,
                filled = %submission.filled_amount,
                "Order submitted"
            );
        }
        Ok(submission)
    }

    /// 사용 가능 잔고 (정규 코드 기준).
    ///
    /// 캐시가 비어 있거나 `force_update`이면 새로 가져옵니다.
    pub async fn available_balances(&self, force_update: bool) -> ExchangeResult<AvailableBalances> {
        const OP: &str = "available_balances";
        if !force_update {
            let cached = self.available_balances.read().unwrap().clone();
            if let Some(cached) = cached {
                return Ok(cached);
            }
        }
        self.require(Capability::AvailableBalances)?;

        let adapter = &self.adapter;
        let fetched = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_available_balances()
        })
        .await?;

        let mut cache = self.available_balances.write().unwrap();
        if let Some(balances) = fetched {
            *cache = Some(self.to_global_codes(balances));
            self.mark_run(OP);
        }
        Ok(cache.clone().unwrap_or_default())
    }

    /// 통화 하나의 사용 가능 잔고. 없으면 0.
    pub async fn available_balance(
        &self,
        code: &str,
        force_update: bool,
    ) -> ExchangeResult<Quantity> {
        let balances = self.available_balances(force_update).await?;
        Ok(balances.get(code).copied().unwrap_or(Decimal::ZERO))
    }

    /// 사용 가능/주문 중/합계 잔고 (정규 코드 기준).
    pub async fn complete_balances(&self) -> ExchangeResult<CompleteBalances> {
        const OP: &str = "complete_balances";
        self.require(Capability::CompleteBalances)?;

        let adapter = &self.adapter;
        let Some(balances) = retry_within_budget(&self.budget, &self.retry, OP, move || {
            adapter.fetch_complete_balances()
        })
        .await?
        else {
            return Ok(CompleteBalances::new());
        };
        self.mark_run(OP);
        Ok(self.to_global_codes(balances))
    }

    fn to_global_codes<V>(&self, balances: HashMap<String, V>) -> HashMap<String, V> {
        balances
            .into_iter()
            .map(|(local, value)| {
                let code = self.registry.get_global_code(&local).unwrap_or(local);
                (code, value)
            })
            .collect()
    }

    // ==================== 실시간 ====================

    /// 티커 스트림을 구독하고 받은 갱신을 레지스트리에 적용합니다.
    ///
    /// 연결이 끊기면 `reconnect_delay` 후 다시 연결합니다. 기능 미지원일 때만 반환합니다.
    pub async fn run_ticker_stream(&self, reconnect_delay: Duration) -> ExchangeResult<()> {
        self.require(Capability::TickerStream)?;

        loop {
            let (tx, mut rx) = mpsc::channel::<Vec<MarketUpdate>>(TICKER_CHANNEL_CAPACITY);
            let producer = self.adapter.stream_tickers(tx);
            let consumer = async {
                let mut batches = 0usize;
                while let Some(batch) = rx.recv().await {
                    self.apply_market_updates(&batch);
                    batches += 1;
                }
                batches
            };

            let (result, batches) = tokio::join!(producer, consumer);
            match result {
                Ok(()) => info!(exchange = %self.name(), batches, "Ticker stream closed"),
                Err(err) if err.is_capability_error() => return Err(err),
                Err(err) => warn!(
                    exchange = %self.name(),
                    batches,
                    error = %err,
                    "Ticker stream failed"
                ),
            }
            if batches > 0 {
                self.mark_run("ticker_stream");
            }

            tokio::time::sleep(reconnect_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExchangeError;
    use aggregator_core::{
        BalanceBreakdown, CurrencyFields, MarketFields, Side, Timeframe, TimeInForce,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 테스트용 어댑터. `failures` 횟수만큼 네트워크 에러를 낸 뒤 성공합니다.
    struct MockAdapter {
        failures: AtomicU32,
        calls: AtomicU32,
        candles: Vec<Candle>,
    }

    impl MockAdapter {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                candles: Vec::new(),
            }
        }

        fn with_candles(mut self, candles: Vec<Candle>) -> Self {
            self.candles = candles;
            self
        }

        fn attempt(&self) -> ExchangeResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ExchangeError::NetworkError("connection refused".into()));
            }
            Ok(())
        }
    }

    const NATIVE: [Timeframe; 3] = [Timeframe::M1, Timeframe::M5, Timeframe::H1];

    #[async_trait]
    impl ExchangeAdapter for MockAdapter {
        fn name(&self) -> &str {
            "mock"
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new().with_all([
                Capability::CurrencyDefinitions,
                Capability::MarketDefinitions,
                Capability::MarketQuotes,
                Capability::Klines,
                Capability::RecentTrades,
                Capability::AvailableBalances,
                Capability::CompleteBalances,
                Capability::SubmitTrade,
            ])
        }

        fn native_intervals(&self) -> &[Timeframe] {
            &NATIVE
        }

        async fn fetch_currency_definitions(
            &self,
        ) -> ExchangeResult<HashMap<String, CurrencyFields>> {
            self.attempt()?;
            let mut defs = HashMap::new();
            for code in ["BTC", "ETH", "BCC"] {
                defs.insert(code.to_string(), CurrencyFields::default());
            }
            Ok(defs)
        }

        async fn fetch_market_definitions(&self) -> ExchangeResult<Vec<MarketUpdate>> {
            self.attempt()?;
            Ok(vec![
                MarketUpdate::definition("ETHBTC", "BTC", "ETH", MarketFields::default()),
                MarketUpdate::definition(
                    "BCCBTC",
                    "BTC",
                    "BCC",
                    MarketFields {
                        is_active: Some(false),
                        is_restricted: Some(true),
                        ..Default::default()
                    },
                ),
            ])
        }

        async fn fetch_market_quotes(&self) -> ExchangeResult<Vec<MarketUpdate>> {
            self.attempt()?;
            Ok(vec![MarketUpdate::for_symbol(
                "ETHBTC",
                MarketFields::quote(dec!(0.05), dec!(1), dec!(0.051), dec!(2)),
            )])
        }

        async fn fetch_klines(
            &self,
            _native_symbol: &str,
            interval: Timeframe,
            _range: KlineRange,
        ) -> ExchangeResult<Vec<Candle>> {
            self.attempt()?;
            assert_eq!(interval, Timeframe::M5);
            Ok(self.candles.clone())
        }

        async fn fetch_recent_trades(&self, _native_symbol: &str) -> ExchangeResult<Vec<MarketTrade>> {
            self.attempt()?;
            let trade = |id: &str, amount| MarketTrade {
                trade_id: id.to_string(),
                side: Side::Buy,
                time: Utc::now(),
                price: dec!(0.05),
                amount,
                total: dec!(0.05) * amount,
            };
            Ok(vec![trade("1", dec!(2)), trade("2", Decimal::ZERO)])
        }

        async fn fetch_available_balances(&self) -> ExchangeResult<AvailableBalances> {
            self.attempt()?;
            let mut balances = HashMap::new();
            balances.insert("BCC".to_string(), dec!(1.5));
            balances.insert("BTC".to_string(), dec!(0.25));
            Ok(balances)
        }

        async fn fetch_complete_balances(&self) -> ExchangeResult<CompleteBalances> {
            self.attempt()?;
            let mut balances = HashMap::new();
            balances.insert("BCC".to_string(), BalanceBreakdown::from_locked(dec!(1), dec!(1)));
            Ok(balances)
        }

        async fn submit_trade(&self, request: &TradeRequest) -> ExchangeResult<TradeSubmission> {
            self.attempt()?;
            Ok(TradeSubmission {
                filled_amount: request.amount,
                order_id: "order-1".to_string(),
            })
        }
    }

    fn session(adapter: MockAdapter) -> (ExchangeSession, Arc<MockAdapter>) {
        let adapter = Arc::new(adapter);
        let mut renames = HashMap::new();
        renames.insert("BCC".to_string(), "BCH".to_string());
        let registry = Arc::new(MarketRegistry::new("mock", renames));
        let session = ExchangeSession::new(
            adapter.clone(),
            registry,
            ErrorBudget::new("mock", 3),
            RetryConfig::immediate(),
        );
        (session, adapter)
    }

    #[tokio::test]
    async fn test_definitions_then_quotes() {
        let (session, _) = session(MockAdapter::new(0));

        // 아직 마켓이 없으므로 새로 해석된 임시 키도 없습니다.
        assert_eq!(session.update_currency_definitions().await.unwrap(), 0);
        assert_eq!(session.update_market_definitions().await.unwrap(), 2);
        assert_eq!(session.update_market_quotes().await.unwrap(), 1);

        let registry = session.registry();
        let eth = registry.get_market("BTC", "ETH").unwrap();
        assert_eq!(eth.best_bid, Some(dec!(0.05)));
        assert!(eth.is_active);
        assert!(registry.get_market("BTC", "BCH").is_some());
        assert!(!registry.is_active("BTC", "BCH"));
        assert_eq!(registry.active_count(), 1);
        assert!(session.last_run("market_quotes").is_some());
    }

    #[tokio::test]
    async fn test_budget_exhaustion_yields_empty() {
        let (session, adapter) = session(MockAdapter::new(10));

        let applied = session.update_market_definitions().await.unwrap();

        assert_eq!(applied, 0);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
        let state = session.error_state();
        assert_eq!(state.count, 3);
        assert!(state.message.contains("connection refused"));
        assert!(session.last_run("market_definitions").is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let (session, adapter) = session(MockAdapter::new(2));

        let applied = session.update_market_definitions().await.unwrap();

        assert_eq!(applied, 2);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.error_state().count, 0);
    }

    #[tokio::test]
    async fn test_undeclared_capability() {
        let (session, adapter) = session(MockAdapter::new(0));

        let err = session.order_book("ETHBTC", 5).await.unwrap_err();
        assert!(err.is_capability_error());
        let err = session.update_market_24hrs().await.unwrap_err();
        assert!(matches!(err, ExchangeError::NotSupported(_)));

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.error_state().count, 0);
    }

    #[tokio::test]
    async fn test_chart_resampled_from_floor_interval() {
        let candles = vec![
            Candle::new(0, dec!(1), dec!(2), dec!(0.5), dec!(1.5), dec!(1), dec!(1)),
            Candle::new(300, dec!(1.5), dec!(3), dec!(1), dec!(2), dec!(1), dec!(1)),
            Candle::new(600, dec!(2), dec!(2.5), dec!(1.8), dec!(2.2), dec!(1), dec!(1)),
            Candle::new(900, dec!(2.2), dec!(2.4), dec!(2), dec!(2.1), dec!(1), dec!(1)),
        ];
        let (session, _) = session(MockAdapter::new(0).with_candles(candles));

        let chart = session.load_chart_data("ETHBTC", 15, 60).await.unwrap();

        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].open_time, 0);
        assert_eq!(chart[0].high, dec!(3));
        assert_eq!(chart[0].close, dec!(2.2));
        assert_eq!(chart[0].volume, dec!(3));
        assert_eq!(chart[1].open_time, 900);
    }

    #[tokio::test]
    async fn test_chart_with_huge_lookback() {
        let (session, adapter) = session(MockAdapter::new(0));

        let chart = session
            .load_chart_data("ETHBTC", 5, u64::MAX / 2)
            .await
            .unwrap();

        assert!(chart.is_empty());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert!(session.last_run("klines").is_some());
    }

    #[tokio::test]
    async fn test_exhausted_calls_leave_last_run_unset() {
        let (session, adapter) = session(MockAdapter::new(10));

        let chart = session.load_chart_data("ETHBTC", 15, 60).await.unwrap();
        assert!(chart.is_empty());
        assert!(session.last_run("klines").is_none());

        let balances = session.complete_balances().await.unwrap();
        assert!(balances.is_empty());
        assert!(session.last_run("complete_balances").is_none());

        // 버짓이 소진된 뒤에는 작업마다 한 번씩만 시도합니다.
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
        assert_eq!(session.error_state().count, 4);
    }

    #[tokio::test]
    async fn test_chart_for_unknown_market_is_empty() {
        let (session, adapter) = session(MockAdapter::new(0));

        let chart = session.load_chart_data_for("BTC", "XRP", 15, 60).await.unwrap();

        assert!(chart.is_empty());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recent_trades_cached_and_filtered() {
        let (session, _) = session(MockAdapter::new(0));

        let trades = session.recent_market_trades("ETHBTC").await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(session.cached_market_trades("ETHBTC"), trades);
        assert!(session.cached_market_trades("LTCBTC").is_empty());
    }

    #[tokio::test]
    async fn test_balances_keyed_by_global_code() {
        let (session, adapter) = session(MockAdapter::new(0));
        session.update_currency_definitions().await.unwrap();

        assert_eq!(session.available_balance("BCH", false).await.unwrap(), dec!(1.5));
        assert_eq!(session.available_balance("XRP", false).await.unwrap(), Decimal::ZERO);
        // 두 번째 조회는 캐시 사용
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);

        session.available_balance("BTC", true).await.unwrap();
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);

        let complete = session.complete_balances().await.unwrap();
        assert_eq!(complete["BCH"].total, dec!(2));
    }

    #[tokio::test]
    async fn test_submit_trade() {
        let (session, _) = session(MockAdapter::new(0));
        let request = TradeRequest {
            side: Side::Buy,
            native_symbol: "ETHBTC".to_string(),
            price: dec!(0.05),
            amount: dec!(3),
            time_in_force: TimeInForce::ImmediateOrCancel,
        };

        let submission = session.submit_trade(&request).await.unwrap();

        assert_eq!(submission.order_id, "order-1");
        assert_eq!(submission.filled_amount, dec!(3));
        assert!(session.last_run("submit_trade").is_some());
    }

    #[tokio::test]
    async fn test_ticker_stream_requires_capability() {
        let (session, _) = session(MockAdapter::new(0));
        let err = session
            .run_ticker_stream(Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(err.is_capability_error());
    }
}
