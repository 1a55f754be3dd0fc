//! 설정 관리.
//!
//! `config/default.toml` 파일을 읽은 뒤 `AGGREGATOR__` 접두사 환경 변수로 덮어씁니다.
//! 예: `AGGREGATOR__EXCHANGES__BINANCE__API_KEY=...`

use crate::error::{AggregatorError, AggregatorResult};
use crate::error_budget::DEFAULT_MAX_ERROR_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 에러 버짓 설정
    #[serde(default)]
    pub error_budget: ErrorBudgetConfig,
    /// 거래소별 설정
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeSettings>,
    /// 기본 차트 화면 설정
    #[serde(default)]
    pub home_view: HomeViewConfig,
    /// 호가창 표시 깊이
    #[serde(default = "default_book_depth")]
    pub display_book_depth: usize,
}

fn default_book_depth() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        let exchanges = ["binance", "bittrex"]
            .into_iter()
            .map(|name| {
                let settings = ExchangeSettings {
                    currency_renames: known_currency_renames(name),
                    ..Default::default()
                };
                (name.to_string(), settings)
            })
            .collect();

        Self {
            logging: LoggingConfig::default(),
            error_budget: ErrorBudgetConfig::default(),
            exchanges,
            home_view: HomeViewConfig::default(),
            display_book_depth: default_book_depth(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 에러 버짓 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBudgetConfig {
    /// 최대 연속 실패 횟수
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    /// 재시도 간 대기 (밀리초)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_error_count() -> u32 {
    DEFAULT_MAX_ERROR_COUNT
}
fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for ErrorBudgetConfig {
    fn default() -> Self {
        Self {
            max_error_count: default_max_error_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// 거래소 설정.
#[derive(Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// 이 거래소 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API 키 (비어 있으면 공개 API만 사용)
    #[serde(default)]
    pub api_key: String,
    /// API 시크릿
    #[serde(default)]
    pub api_secret: String,
    /// REST API 기본 URL 재정의
    #[serde(default)]
    pub rest_base_url: Option<String>,
    /// WebSocket 기본 URL 재정의
    #[serde(default)]
    pub ws_base_url: Option<String>,
    /// 시세 폴링 간격 (초)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// 로컬 코드 -> 글로벌 코드 이름 변경
    #[serde(default)]
    pub currency_renames: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    30
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: String::new(),
            api_secret: String::new(),
            rest_base_url: None,
            ws_base_url: None,
            poll_interval_secs: default_poll_interval(),
            currency_renames: HashMap::new(),
        }
    }
}

impl ExchangeSettings {
    /// 비공개 API 자격증명이 설정되어 있는지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl fmt::Debug for ExchangeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("rest_base_url", &self.rest_base_url)
            .field("ws_base_url", &self.ws_base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("currency_renames", &self.currency_renames)
            .finish()
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "[REDACTED]"
    }
}

/// 거래소별로 알려진 통화 코드 이름 변경.
pub fn known_currency_renames(exchange: &str) -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = match exchange.to_lowercase().as_str() {
        "binance" => &[("BCC", "BCH")],
        "bittrex" => &[("BITS", "BITS_BITSWIFT")],
        "poloniex" => &[
            ("BITS", "BITS_BITSTAR"),
            ("BTM", "BTM_BITMARK"),
            ("STR", "XLM"),
            ("APH", "APH_APHRODITE"),
        ],
        "kucoin" => &[("CPC", "CPC_CPCHAIN")],
        _ => &[],
    };
    pairs
        .iter()
        .map(|(local, global)| (local.to_string(), global.to_string()))
        .collect()
}

/// 기본 차트 화면 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HomeViewConfig {
    /// 거래소 이름
    pub exchange: String,
    /// 기준 통화
    pub base: String,
    /// 거래 통화
    pub curr: String,
    /// 차트 간격 (분)
    pub chart_interval_minutes: u64,
    /// 차트 룩백 (분)
    pub chart_lookback_minutes: u64,
}

impl Default for HomeViewConfig {
    fn default() -> Self {
        Self {
            exchange: "bittrex".to_string(),
            base: "USD".to_string(),
            curr: "BTC".to_string(),
            chart_interval_minutes: 15,
            chart_lookback_minutes: 24 * 60,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("AGGREGATOR")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 활성화된 거래소 설정을 이름 순으로 반환합니다.
    pub fn enabled_exchanges(&self) -> Vec<(&str, &ExchangeSettings)> {
        let mut enabled: Vec<(&str, &ExchangeSettings)> = self
            .exchanges
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(name, settings)| (name.as_str(), settings))
            .collect();
        enabled.sort_by_key(|(name, _)| *name);
        enabled
    }

    /// 0이 될 수 없는 값들을 검사합니다.
    pub fn validate(&self) -> AggregatorResult<()> {
        if self.error_budget.max_error_count == 0 {
            return Err(AggregatorError::Config(
                "error_budget.max_error_count must be at least 1".to_string(),
            ));
        }
        if self.display_book_depth == 0 {
            return Err(AggregatorError::Config(
                "display_book_depth must be at least 1".to_string(),
            ));
        }
        let home = &self.home_view;
        if home.chart_interval_minutes == 0 || home.chart_lookback_minutes == 0 {
            return Err(AggregatorError::InvalidInput(format!(
                "home_view chart {}m over {}m",
                home.chart_interval_minutes, home.chart_lookback_minutes
            )));
        }
        Ok(())
    }
}
