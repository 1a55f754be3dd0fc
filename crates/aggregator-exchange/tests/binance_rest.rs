//! Binance REST 어댑터 통합 테스트 (mockito).

use aggregator_core::{
    ErrorBudget, KlineRange, MarketRegistry, Side, TimeInForce, Timeframe, TradeRequest,
};
use aggregator_exchange::connector::{BinanceAdapter, BinanceConfig};
use aggregator_exchange::{Capability, ExchangeAdapter, ExchangeError, ExchangeSession, RetryConfig};
use mockito::{Matcher, Server, ServerGuard};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

const EXCHANGE_INFO: &str = include_str!("fixtures/binance_exchange_info.json");
const BOOK_TICKER: &str = include_str!("fixtures/binance_book_ticker.json");
const TICKER_24HR: &str = include_str!("fixtures/binance_ticker_24hr.json");

fn public_adapter(server: &ServerGuard) -> BinanceAdapter {
    BinanceAdapter::new(BinanceConfig::default().with_rest_base_url(server.url())).unwrap()
}

fn private_adapter(server: &ServerGuard) -> BinanceAdapter {
    BinanceAdapter::new(BinanceConfig::new("test-key", "test-secret").with_rest_base_url(server.url()))
        .unwrap()
}

fn session_for(adapter: BinanceAdapter) -> ExchangeSession {
    let mut renames = HashMap::new();
    renames.insert("BCC".to_string(), "BCH".to_string());
    ExchangeSession::new(
        Arc::new(adapter),
        Arc::new(MarketRegistry::new("binance", renames)),
        ErrorBudget::new("binance", 3),
        RetryConfig::immediate(),
    )
}

async fn mock_server_time(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/api/v3/time")
        .with_status(200)
        .with_body(r#"{"serverTime": 1499827319559}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_market_structure_into_registry() {
    let mut server = Server::new_async().await;
    let info = server
        .mock("GET", "/api/v3/exchangeInfo")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(EXCHANGE_INFO)
        .expect(2)
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/api/v3/ticker/bookTicker")
        .with_status(200)
        .with_body(BOOK_TICKER)
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/api/v3/ticker/24hr")
        .with_status(200)
        .with_body(TICKER_24HR)
        .create_async()
        .await;

    let session = session_for(public_adapter(&server));
    session.update_currency_definitions().await.unwrap();
    assert_eq!(session.update_market_definitions().await.unwrap(), 3);
    session.update_market_quotes().await.unwrap();
    session.update_market_24hrs().await.unwrap();
    info.assert_async().await;

    let registry = session.registry();
    let active = registry.get_active_markets();
    assert_eq!(active["BTC"].len(), 1);
    assert!(active["BTC"].contains_key("ETH"));
    assert!(active["USDT"].contains_key("ETH"));

    // BCC는 BCH로 이름이 바뀌고, 거래 중단 상태라 활성 집합에서 빠집니다.
    let bch = registry.get_market("BTC", "BCH").unwrap();
    assert!(bch.is_restricted);
    assert!(!registry.is_active("BTC", "BCH"));
    assert_eq!(registry.get_local_code("BCH").as_deref(), Some("BCC"));

    let eth = registry.get_market("BTC", "ETH").unwrap();
    assert_eq!(eth.price_increment, dec!(0.000001));
    assert_eq!(eth.curr_min_amount, dec!(0.001));
    assert_eq!(eth.best_bid, Some(dec!(0.0521)));
    assert_eq!(eth.best_ask_size, Some(dec!(3)));
    assert_eq!(eth.base_volume, Some(dec!(4351.2)));
    assert_eq!(eth.curr_volume, Some(dec!(84000)));
    assert_eq!(eth.percent_move_24h, Some(dec!(1.956)));
    assert!(eth.timestamp.is_some());

    let eth_usdt = registry.get_market("USDT", "ETH").unwrap();
    assert_eq!(eth_usdt.base_increment, dec!(0.01));

    // 정의되지 않은 심볼의 시세는 버려집니다.
    assert!(registry.get_market_by_symbol("XRPBTC").is_none());
}

#[tokio::test]
async fn test_klines_request_and_conversion() {
    let mut server = Server::new_async().await;
    let klines = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "ETHBTC".into()),
            Matcher::UrlEncoded("interval".into(), "5m".into()),
            Matcher::UrlEncoded("startTime".into(), "1499040000000".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"[
                [1499040000000, "0.0163", "0.0170", "0.0160", "0.0165", "100.0", 1499040299999, "1.65", 10, "50.0", "0.8", "0"],
                [1499040300000, "0.0165", "0.0180", "0.0164", "0.0175", "200.0", 1499040599999, "3.5", 20, "90.0", "1.6", "0"]
            ]"#,
        )
        .create_async()
        .await;

    let adapter = public_adapter(&server);
    let range = KlineRange {
        start: Some(1_499_040_000),
        ..Default::default()
    };
    let candles = adapter
        .fetch_klines("ETHBTC", Timeframe::M5, range)
        .await
        .unwrap();

    klines.assert_async().await;
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].open_time, 1_499_040_300);
    assert_eq!(candles[1].high, dec!(0.018));
    assert_eq!(candles[1].base_volume, dec!(3.5));
}

#[tokio::test]
async fn test_order_book_truncated_to_depth() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/depth")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "ETHBTC".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"lastUpdateId": 1027024,
                "bids": [["0.0521", "1.0"], ["0.0520", "2.0"], ["0.0519", "3.0"]],
                "asks": [["0.0522", "1.5"]]}"#,
        )
        .create_async()
        .await;

    let book = public_adapter(&server)
        .fetch_order_book("ETHBTC", 2)
        .await
        .unwrap();

    assert_eq!(book.bids.len(), 2);
    assert_eq!(book.asks.len(), 1);
    assert_eq!(book.best_bid().unwrap().price, dec!(0.0521));
    assert!(book.tradeable);
}

#[tokio::test]
async fn test_order_book_exhaustion_leaves_last_run_unset() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/api/v3/depth")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("Bad Gateway")
        .expect(3)
        .create_async()
        .await;

    let session = session_for(public_adapter(&server));
    let book = session.order_book("ETHBTC", 5).await.unwrap();

    failing.assert_async().await;
    assert!(book.bids.is_empty());
    assert!(!book.tradeable);
    assert!(session.last_run("order_book").is_none());
    assert_eq!(session.error_state().count, 3);
}

#[tokio::test]
async fn test_klines_start_time_clamped_to_epoch() {
    let mut server = Server::new_async().await;
    let klines = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::UrlEncoded("startTime".into(), "0".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let range = KlineRange::lookback(1_499_040_000, u64::MAX);
    let candles = public_adapter(&server)
        .fetch_klines("ETHBTC", Timeframe::M5, range)
        .await
        .unwrap();

    klines.assert_async().await;
    assert!(candles.is_empty());
}

#[tokio::test]
async fn test_recent_trades_drop_empty_rows() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/trades")
        .match_query(Matcher::UrlEncoded("symbol".into(), "ETHBTC".into()))
        .with_status(200)
        .with_body(
            r#"[
                {"id": 28457, "price": "0.0521", "qty": "2.0", "quoteQty": "0.1042", "time": 1499865549590, "isBuyerMaker": true, "isBestMatch": true},
                {"id": 28458, "price": "0.0521", "qty": "0.0", "quoteQty": "0", "time": 1499865549591, "isBuyerMaker": false, "isBestMatch": true}
            ]"#,
        )
        .create_async()
        .await;

    let trades = public_adapter(&server)
        .fetch_recent_trades("ETHBTC")
        .await
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_id, "28457");
    assert_eq!(trades[0].side, Side::Buy);
    assert_eq!(trades[0].total, dec!(0.1042));
}

#[tokio::test]
async fn test_api_error_payload_exhausts_budget() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/api/v3/ticker/bookTicker")
        .with_status(400)
        .with_body(r#"{"code": -1100, "msg": "Illegal characters found in parameter"}"#)
        .expect(3)
        .create_async()
        .await;

    let session = session_for(public_adapter(&server));
    let applied = session.update_market_quotes().await.unwrap();

    failing.assert_async().await;
    assert_eq!(applied, 0);
    let state = session.error_state();
    assert_eq!(state.count, 3);
    assert!(state.message.contains("Illegal characters"));
}

#[tokio::test]
async fn test_malformed_quote_counts_error_and_keeps_prices() {
    let mut server = Server::new_async().await;
    let _info = server
        .mock("GET", "/api/v3/exchangeInfo")
        .with_status(200)
        .with_body(EXCHANGE_INFO)
        .create_async()
        .await;
    let good = server
        .mock("GET", "/api/v3/ticker/bookTicker")
        .with_status(200)
        .with_body(BOOK_TICKER)
        .create_async()
        .await;

    let session = session_for(public_adapter(&server));
    session.update_market_definitions().await.unwrap();
    session.update_market_quotes().await.unwrap();
    good.remove_async().await;

    let malformed = server
        .mock("GET", "/api/v3/ticker/bookTicker")
        .with_status(200)
        .with_body(
            r#"[{"symbol": "ETHBTC", "bidPrice": "garbage", "bidQty": "1.0", "askPrice": "", "askQty": "1.0"}]"#,
        )
        .expect(3)
        .create_async()
        .await;

    let applied = session.update_market_quotes().await.unwrap();

    malformed.assert_async().await;
    assert_eq!(applied, 0);
    assert_eq!(session.error_state().count, 3);

    let eth = session.registry().get_market("BTC", "ETH").unwrap();
    assert_eq!(eth.best_bid, Some(dec!(0.0521)));
    assert_eq!(eth.best_ask, Some(dec!(0.05212)));
}

#[tokio::test]
async fn test_rate_limit_maps_to_rate_limited() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/exchangeInfo")
        .with_status(429)
        .with_body(r#"{"code": -1003, "msg": "Too many requests"}"#)
        .create_async()
        .await;

    let err = public_adapter(&server)
        .fetch_market_definitions()
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::RateLimited));
}

#[tokio::test]
async fn test_private_calls_signed_with_server_time() {
    let mut server = Server::new_async().await;
    let time = mock_server_time(&mut server).await;
    let account = server
        .mock("GET", "/api/v3/account")
        .match_header("X-MBX-APIKEY", "test-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::Regex("timestamp=\\d+".into()),
            Matcher::Regex("signature=[0-9a-f]{64}".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"makerCommission": 15, "canTrade": true, "balances": [
                {"asset": "BTC", "free": "4723846.89208129", "locked": "0.00000000"},
                {"asset": "BCC", "free": "1.50000000", "locked": "0.50000000"}
            ]}"#,
        )
        .expect(2)
        .create_async()
        .await;

    let adapter = private_adapter(&server);
    assert!(adapter.capabilities().contains(Capability::AvailableBalances));

    let available = adapter.fetch_available_balances().await.unwrap();
    assert_eq!(available["BCC"], dec!(1.5));

    let complete = adapter.fetch_complete_balances().await.unwrap();
    assert_eq!(complete["BCC"].on_orders, dec!(0.5));
    assert_eq!(complete["BCC"].total, dec!(2));

    // 서버 시각은 한 번만 동기화합니다.
    time.assert_async().await;
    account.assert_async().await;
}

#[tokio::test]
async fn test_submit_ioc_limit_order() {
    let mut server = Server::new_async().await;
    let _time = mock_server_time(&mut server).await;
    let order = server
        .mock("POST", "/api/v3/order")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("symbol=ETHBTC".into()),
            Matcher::Regex("side=SELL".into()),
            Matcher::Regex("type=LIMIT".into()),
            Matcher::Regex("timeInForce=IOC".into()),
            Matcher::Regex("quantity=2\\.50000000".into()),
            Matcher::Regex("price=0\\.05210000".into()),
            Matcher::Regex("newOrderRespType=RESULT".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"symbol": "ETHBTC", "orderId": 28, "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
                "transactTime": 1507725176595, "price": "0.05210000", "origQty": "2.50000000",
                "executedQty": "1.00000000", "status": "EXPIRED", "timeInForce": "IOC",
                "type": "LIMIT", "side": "SELL"}"#,
        )
        .create_async()
        .await;

    let request = TradeRequest {
        side: Side::Sell,
        native_symbol: "ETHBTC".to_string(),
        price: dec!(0.0521),
        amount: dec!(2.5),
        time_in_force: TimeInForce::ImmediateOrCancel,
    };
    let submission = private_adapter(&server).submit_trade(&request).await.unwrap();

    order.assert_async().await;
    assert_eq!(submission.order_id, "6gCrw2kRUAF9CvJDGP16IP");
    assert_eq!(submission.filled_amount, dec!(1));
}

#[tokio::test]
async fn test_private_call_without_credentials_not_supported() {
    let server = Server::new_async().await;
    let session = session_for(public_adapter(&server));

    let err = session.available_balances(true).await.unwrap_err();

    assert!(err.is_capability_error());
    assert_eq!(session.error_state().count, 0);
}
