//! 거래소 어댑터 에러 타입.
//!
//! `NotSupported`를 제외한 모든 에러는 일시적 실패로 취급되어 에러 버짓에 누적됩니다.
//! `NotSupported`는 어댑터가 선언하지 않은 기능을 호출한 계약 위반입니다.

use thiserror::Error;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 거래소가 보고한 API 에러 (에러 코드 또는 success=false 응답)
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// 어댑터가 선언하지 않은 기능
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 에러 버짓에 누적해야 하는 에러인지 확인.
    ///
    /// 전송/파싱 실패와 API 에러는 누적되고, 기능 미지원은 누적되지 않습니다.
    pub fn counts_against_budget(&self) -> bool {
        !self.is_capability_error()
    }

    /// 기능 미지원(계약 위반) 에러인지 확인.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, ExchangeError::NotSupported(_))
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited => Some(60000),
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Timeout(_) => Some(500),
            ExchangeError::WebSocket(_) => Some(2000),
            _ => None,
        }
    }

    /// 인증 에러인지 확인. 재시도 루프는 인증 에러를 반복하지 않습니다.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(err.to_string())
    }
}
