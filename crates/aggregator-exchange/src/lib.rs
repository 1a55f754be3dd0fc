//! 거래소 연결과 거래소별 세션.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ExchangeAdapter trait: 기능 선언 기반 거래소 인터페이스
//! - Binance 커넥터 (REST + 전체 마켓 티커 WebSocket)
//! - Bittrex 커넥터 (REST)
//! - 에러 버짓 기반 재시도 루프
//! - 어댑터, 레지스트리, 에러 버짓을 묶는 ExchangeSession

pub mod connector;
pub mod error;
pub mod retry;
pub mod session;
pub mod traits;
pub mod websocket;

pub use connector::{build_adapter, open_session, SUPPORTED_EXCHANGES};
pub use error::*;
pub use retry::{retry_within_budget, with_retry, RetryConfig};
pub use session::ExchangeSession;
pub use traits::*;
