//! # Aggregator Core
//!
//! 여러 거래소의 시장 데이터를 하나의 정규화된 모델로 통합하는 핵심 크레이트입니다.
//!
//! 이 크레이트는 네트워크 코드 없이 다음을 제공합니다:
//! - 통화/마켓/캔들/호가창/잔고 도메인 모델
//! - 거래소 로컬 코드와 글로벌 코드 간 매핑
//! - 마켓 레지스트리 (병합 갱신 및 활성 마켓 집합)
//! - 연속 실패 횟수를 제한하는 에러 버짓
//! - 캔들 리샘플링
//! - 설정 관리 및 로깅 인프라

pub mod code_map;
pub mod config;
pub mod domain;
pub mod error;
pub mod error_budget;
pub mod logging;
pub mod registry;
pub mod resample;
pub mod types;

pub use code_map::CodeMapper;
pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use error_budget::{ErrorBudget, ErrorState, DEFAULT_MAX_ERROR_COUNT};
pub use logging::*;
pub use registry::{MarketRegistry, SymbolMapping, UpdateOutcome};
pub use resample::{resample, select_native_interval};
pub use types::*;
