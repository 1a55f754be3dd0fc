//! 에러 타입 정의.

use aggregator_core::AggregatorError;
use aggregator_exchange::ExchangeError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// 설정 값 검증 실패
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] AggregatorError),

    /// 설정에 없거나 비활성화된 거래소
    #[error("Exchange not configured: {0}")]
    ExchangeNotConfigured(String),

    /// 레지스트리에 없는 마켓
    #[error("Market not found: {base}/{curr} on {exchange}")]
    MarketNotFound {
        exchange: String,
        base: String,
        curr: String,
    },

    /// 거래소 어댑터 에러
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
