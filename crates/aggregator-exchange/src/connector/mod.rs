//! 거래소 커넥터.

pub mod binance;
pub mod bittrex;

pub use binance::{BinanceAdapter, BinanceConfig};
pub use bittrex::{BittrexAdapter, BittrexConfig};

use aggregator_core::{
    known_currency_renames, ErrorBudget, ErrorBudgetConfig, ExchangeSettings, MarketRegistry,
};
use std::sync::Arc;
use tracing::info;

use crate::retry::RetryConfig;
use crate::session::ExchangeSession;
use crate::traits::{ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

/// 지원하는 거래소 이름.
pub const SUPPORTED_EXCHANGES: [&str; 2] = [binance::EXCHANGE_NAME, bittrex::EXCHANGE_NAME];

/// 이름과 설정으로 어댑터를 생성합니다.
pub fn build_adapter(
    name: &str,
    settings: &ExchangeSettings,
) -> ExchangeResult<Arc<dyn ExchangeAdapter>> {
    match name.to_ascii_lowercase().as_str() {
        binance::EXCHANGE_NAME => Ok(Arc::new(BinanceAdapter::new(BinanceConfig::from_settings(
            settings,
        ))?)),
        bittrex::EXCHANGE_NAME => Ok(Arc::new(BittrexAdapter::new(BittrexConfig::from_settings(
            settings,
        ))?)),
        other => Err(ExchangeError::NotSupported(format!(
            "unknown exchange: {}",
            other
        ))),
    }
}

/// 어댑터, 레지스트리, 에러 버짓을 묶은 세션을 생성합니다.
///
/// 통화 이름 변경은 거래소별 기본값 위에 설정 값을 덮어씁니다.
pub fn open_session(
    name: &str,
    settings: &ExchangeSettings,
    budget: &ErrorBudgetConfig,
) -> ExchangeResult<ExchangeSession> {
    let adapter = build_adapter(name, settings)?;
    let mut renames = known_currency_renames(adapter.name());
    // 설정 로더가 테이블 키를 소문자로 바꿀 수 있어 로컬 코드는 대문자로 맞춥니다.
    renames.extend(
        settings
            .currency_renames
            .iter()
            .map(|(local, global)| (local.to_uppercase(), global.clone())),
    );
    let registry = Arc::new(MarketRegistry::new(adapter.name(), renames));
    let capabilities = adapter.capabilities();
    info!(
        exchange = %adapter.name(),
        capabilities = capabilities.len(),
        private = settings.has_credentials(),
        "Exchange session opened"
    );

    Ok(ExchangeSession::new(
        adapter.clone(),
        registry,
        ErrorBudget::new(adapter.name(), budget.max_error_count),
        RetryConfig::from_settings(budget),
    ))
}
