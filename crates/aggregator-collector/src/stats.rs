//! 폴링 통계 구조체.

use serde::Serialize;
use std::time::Duration;

/// 거래소 하나의 폴링 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStats {
    /// 거래소 이름
    pub exchange: String,
    /// 완료된 폴링 주기 수
    pub rounds: usize,
    /// 적용된 시세 갱신 수 (누적)
    pub quotes_applied: usize,
    /// 적용된 24시간 통계 갱신 수 (누적)
    pub stats_applied: usize,
    /// 에러로 끝난 작업 수
    pub errors: usize,
    /// 마지막 주기 소요 시간
    #[serde(skip)]
    pub last_elapsed: Duration,
}

impl PollStats {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            ..Default::default()
        }
    }

    /// 한 주기의 결과를 누적합니다.
    pub fn record_round(&mut self, quotes: usize, stats: usize, elapsed: Duration) {
        self.rounds += 1;
        self.quotes_applied += quotes;
        self.stats_applied += stats;
        self.last_elapsed = elapsed;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// 주기당 평균 시세 갱신 수
    pub fn average_quotes(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.quotes_applied as f64 / self.rounds as f64
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            exchange = %self.exchange,
            rounds = self.rounds,
            quotes_applied = self.quotes_applied,
            stats_applied = self.stats_applied,
            errors = self.errors,
            average_quotes = format!("{:.1}", self.average_quotes()),
            elapsed = format!("{:.2}s", self.last_elapsed.as_secs_f64()),
            "Polling summary"
        );
    }
}
