//! 데몬 모드: 거래소별 폴링 태스크와 티커 스트림.

use aggregator_core::AppConfig;
use aggregator_exchange::{open_session, Capability, ExchangeSession};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::stats::PollStats;

/// 티커 스트림 재연결 대기 시간
pub const TICKER_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// 폴링 간격 하한
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 설정에서 활성화된 거래소마다 세션을 엽니다.
///
/// 지원하지 않는 거래소는 경고 후 건너뜁니다.
pub fn open_sessions(config: &AppConfig) -> Vec<(Arc<ExchangeSession>, Duration)> {
    config
        .enabled_exchanges()
        .into_iter()
        .filter_map(|(name, settings)| {
            match open_session(name, settings, &config.error_budget) {
                Ok(session) => Some((
                    Arc::new(session),
                    Duration::from_secs(settings.poll_interval_secs).max(MIN_POLL_INTERVAL),
                )),
                Err(e) => {
                    warn!(exchange = %name, error = %e, "Skipping exchange");
                    None
                }
            }
        })
        .collect()
}

/// 통화 정의와 마켓 정의를 순서대로 로드합니다.
pub async fn load_definitions(session: &ExchangeSession) -> Result<()> {
    if session.supports(Capability::CurrencyDefinitions) {
        session.update_currency_definitions().await?;
    }
    session.update_market_definitions().await?;
    Ok(())
}

/// 폴링 한 주기: 시세와 24시간 통계를 갱신합니다.
async fn poll_once(session: &ExchangeSession, stats: &mut PollStats) {
    let started = Instant::now();

    let quotes = match session.update_market_quotes().await {
        Ok(applied) => applied,
        Err(e) => {
            warn!(exchange = %session.name(), error = %e, "Quote update failed");
            stats.record_error();
            0
        }
    };

    let daily = if session.supports(Capability::Market24h) {
        match session.update_market_24hrs().await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(exchange = %session.name(), error = %e, "24h update failed");
                stats.record_error();
                0
            }
        }
    } else {
        0
    };

    stats.record_round(quotes, daily, started.elapsed());
}

/// 거래소 하나의 폴링 루프. 정의 로드에 실패하면 종료합니다.
pub async fn poll_exchange(session: Arc<ExchangeSession>, interval: Duration) {
    if let Err(e) = load_definitions(&session).await {
        error!(exchange = %session.name(), error = %e, "Failed to load definitions");
        return;
    }
    info!(
        exchange = %session.name(),
        markets = session.registry().market_count(),
        active = session.registry().active_count(),
        interval_secs = interval.as_secs(),
        "Polling started"
    );

    let mut stats = PollStats::new(session.name());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        poll_once(&session, &mut stats).await;
        stats.log_summary();
    }
}

/// 모든 거래소의 폴링/스트림 태스크를 실행하고 종료 신호를 기다립니다.
pub async fn run(config: &AppConfig) -> Result<()> {
    let sessions = open_sessions(config);
    if sessions.is_empty() {
        warn!("No exchanges enabled, nothing to collect");
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    for (session, interval) in sessions {
        if session.supports(Capability::TickerStream) {
            let streaming = session.clone();
            tasks.spawn(async move {
                if let Err(e) = streaming.run_ticker_stream(TICKER_RECONNECT_DELAY).await {
                    error!(exchange = %streaming.name(), error = %e, "Ticker stream stopped");
                }
            });
        }
        tasks.spawn(poll_exchange(session, interval));
    }
    info!(tasks = tasks.len(), "Collector running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            joined = tasks.join_next() => match joined {
                Some(Err(e)) => error!(error = %e, "Collector task panicked"),
                Some(Ok(())) => {}
                None => {
                    warn!("All collector tasks finished");
                    break;
                }
            },
        }
    }

    tasks.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_core::ExchangeSettings;

    #[test]
    fn test_open_sessions_skips_unknown_and_disabled() {
        let mut config = AppConfig::default();
        config
            .exchanges
            .insert("mtgox".to_string(), ExchangeSettings::default());
        config.exchanges.get_mut("bittrex").unwrap().enabled = false;
        config.exchanges.get_mut("binance").unwrap().poll_interval_secs = 0;

        let sessions = open_sessions(&config);

        assert_eq!(sessions.len(), 1);
        let (session, interval) = &sessions[0];
        assert_eq!(session.name(), "binance");
        assert_eq!(*interval, MIN_POLL_INTERVAL);
    }
}
