//! 어댑터별 연속 실패 카운터.
//!
//! 모든 원격 호출은 성공 시 [`ErrorBudget::record_success`],
//! 실패 시 [`ErrorBudget::record_failure`]를 기록합니다.
//! 재시도 여부는 호출자가 [`ErrorBudget::retry_count_not_exceeded`]로 판단하며,
//! 버짓 자체는 재시도를 수행하지 않습니다.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;
use tracing::warn;

/// 기본 최대 연속 실패 횟수.
pub const DEFAULT_MAX_ERROR_COUNT: u32 = 3;

/// 에러 상태 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorState {
    /// 연속 실패 횟수
    pub count: u32,
    /// 마지막 에러 메시지 (성공 후 비어 있음)
    pub message: String,
    /// 마지막 성공 시각
    pub last_success: Option<DateTime<Utc>>,
}

/// 연속 실패 버짓.
#[derive(Debug)]
pub struct ErrorBudget {
    name: String,
    max_error_count: u32,
    state: RwLock<ErrorState>,
}

impl ErrorBudget {
    /// 새 버짓을 생성합니다.
    pub fn new(name: impl Into<String>, max_error_count: u32) -> Self {
        Self {
            name: name.into(),
            max_error_count,
            state: RwLock::new(ErrorState::default()),
        }
    }

    /// 기본 임계값(3)으로 생성합니다.
    pub fn with_default_limit(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_MAX_ERROR_COUNT)
    }

    /// 성공을 기록합니다. 카운트와 메시지를 초기화합니다.
    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();
        state.count = 0;
        state.message.clear();
        state.last_success = Some(Utc::now());
    }

    /// 실패를 기록합니다.
    pub fn record_failure(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.state.write().unwrap();
        state.count += 1;
        warn!(
            budget = %self.name,
            count = state.count,
            max = self.max_error_count,
            "Request failed: {}",
            message
        );
        state.message = message;
    }

    /// 연속 실패 횟수가 임계값 미만인지 확인합니다.
    pub fn retry_count_not_exceeded(&self) -> bool {
        self.state.read().unwrap().count < self.max_error_count
    }

    /// 현재 상태의 복사본을 반환합니다.
    pub fn state(&self) -> ErrorState {
        self.state.read().unwrap().clone()
    }

    /// 현재 연속 실패 횟수.
    pub fn count(&self) -> u32 {
        self.state.read().unwrap().count
    }

    pub fn max_error_count(&self) -> u32 {
        self.max_error_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
