//! 단발성 CLI 명령.

use aggregator_core::{AppConfig, Candle, Market, OrderBook};
use aggregator_exchange::{open_session, ExchangeSession};
use chrono::DateTime;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use crate::daemon::load_definitions;
use crate::error::{CollectorError, Result};

/// 설정 파일을 읽고 검증합니다.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// 설정된 거래소 세션을 열고 정의와 시세를 로드합니다.
pub async fn prepare_session(config: &AppConfig, exchange: &str) -> Result<ExchangeSession> {
    let settings = config
        .exchanges
        .iter()
        .find(|(name, settings)| name.eq_ignore_ascii_case(exchange) && settings.enabled)
        .map(|(_, settings)| settings)
        .ok_or_else(|| CollectorError::ExchangeNotConfigured(exchange.to_string()))?;

    let session = open_session(exchange, settings, &config.error_budget)?;
    load_definitions(&session).await?;
    session.update_market_quotes().await?;
    Ok(session)
}

fn native_symbol(session: &ExchangeSession, base: &str, curr: &str) -> Result<String> {
    session
        .registry()
        .get_market_symbol(base, curr)
        .ok_or_else(|| CollectorError::MarketNotFound {
            exchange: session.name().to_string(),
            base: base.to_string(),
            curr: curr.to_string(),
        })
}

/// 활성 마켓 목록.
pub async fn list_markets(config: &AppConfig, exchange: &str) -> Result<String> {
    let session = prepare_session(config, exchange).await?;
    Ok(format_markets(&session.registry().get_active_markets()))
}

/// 리샘플링된 차트.
pub async fn show_chart(
    config: &AppConfig,
    exchange: &str,
    base: &str,
    curr: &str,
    interval_minutes: u64,
    lookback_minutes: u64,
) -> Result<String> {
    let session = prepare_session(config, exchange).await?;
    // 마켓 존재 여부를 먼저 확인해 빈 차트와 구분합니다.
    native_symbol(&session, base, curr)?;
    let candles = session
        .load_chart_data_for(base, curr, interval_minutes, lookback_minutes)
        .await?;
    Ok(format_candles(&candles))
}

/// 호가창.
pub async fn show_order_book(
    config: &AppConfig,
    exchange: &str,
    base: &str,
    curr: &str,
    depth: usize,
) -> Result<String> {
    let session = prepare_session(config, exchange).await?;
    let symbol = native_symbol(&session, base, curr)?;
    let book = session.order_book(&symbol, depth).await?;
    Ok(format_order_book(&book))
}

// ==================== 출력 형식 ====================

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// 기준 통화별로 묶은 마켓 표.
pub fn format_markets(markets: &BTreeMap<String, BTreeMap<String, Market>>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<14} {:>16} {:>16} {:>16} {:>10}",
        "BASE", "CURR", "BID", "ASK", "LAST", "24H %"
    );
    for (base, by_curr) in markets {
        for (curr, market) in by_curr {
            let _ = writeln!(
                out,
                "{:<8} {:<14} {:>16} {:>16} {:>16} {:>10}",
                base,
                curr,
                or_dash(market.best_bid),
                or_dash(market.best_ask),
                or_dash(market.last_price),
                or_dash(market.percent_move_24h.map(|p| p.round_dp(2))),
            );
        }
    }
    let total: usize = markets.values().map(BTreeMap::len).sum();
    let _ = writeln!(out, "{} markets", total);
    out
}

/// 캔들 표. 시각은 UTC.
pub fn format_candles(candles: &[Candle]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:>14} {:>14} {:>14} {:>14} {:>16}",
        "TIME", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"
    );
    for candle in candles {
        let time = DateTime::from_timestamp(candle.open_time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| candle.open_time.to_string());
        let _ = writeln!(
            out,
            "{:<20} {:>14} {:>14} {:>14} {:>14} {:>16}",
            time, candle.open, candle.high, candle.low, candle.close, candle.volume
        );
    }
    let _ = writeln!(out, "{} candles", candles.len());
    out
}

/// 매도 호가를 위에서 아래로, 매수 호가를 그 아래에 출력합니다.
pub fn format_order_book(book: &OrderBook) -> String {
    let mut out = String::new();
    if !book.tradeable {
        let _ = writeln!(out, "(empty order book)");
        return out;
    }
    let _ = writeln!(out, "{:<6} {:>16} {:>16}", "SIDE", "PRICE", "QUANTITY");
    for level in book.asks.iter().rev() {
        let _ = writeln!(out, "{:<6} {:>16} {:>16}", "ASK", level.price, level.quantity);
    }
    for level in &book.bids {
        let _ = writeln!(out, "{:<6} {:>16} {:>16}", "BID", level.price, level.quantity);
    }
    out
}
