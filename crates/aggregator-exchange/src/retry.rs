//! 에러 버짓 기반 재시도 루프.
//!
//! 재귀 없이 반복문으로 동작합니다. 실패할 때마다 버짓에 기록하고,
//! 버짓이 소진되면 마지막 에러를 버짓에 남긴 채 빈 결과를 반환합니다.
//! 기능 미지원 에러는 버짓에 기록하지 않고 그대로 반환합니다.
//! 인증 에러는 버짓에 기록하되 같은 키로 다시 시도하지 않습니다.

use aggregator_core::{ErrorBudget, ErrorBudgetConfig};
use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::traits::ExchangeResult;
use crate::ExchangeError;

/// 재시도 대기 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 기본 대기 시간
    pub base_delay: Duration,
    /// 에러가 권장하는 대기 시간의 상한
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// 대기 없이 즉시 재시도합니다.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &ErrorBudgetConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.retry_delay_ms),
            ..Default::default()
        }
    }

    /// 에러에 맞는 대기 시간을 계산합니다.
    pub fn delay_for(&self, err: &ExchangeError) -> Duration {
        err.retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay)
            .min(self.max_delay)
    }
}

/// 버짓이 허용하는 동안 작업을 반복합니다.
///
/// 성공하면 버짓을 초기화하고 `Some`을, 버짓이 소진되면 `None`을 반환합니다.
/// `Err`는 기능 미지원일 때만 반환됩니다.
pub async fn retry_within_budget<T, F, Fut>(
    budget: &ErrorBudget,
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> ExchangeResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                budget.record_success();
                return Ok(Some(value));
            }
            Err(err) if !err.counts_against_budget() => return Err(err),
            Err(err) => {
                budget.record_failure(format!("{}: {}", operation, err));
                if err.is_auth_error() {
                    error!(
                        budget = %budget.name(),
                        operation,
                        attempts,
                        "Credentials rejected, not retrying"
                    );
                    return Ok(None);
                }
                if !budget.retry_count_not_exceeded() {
                    error!(
                        budget = %budget.name(),
                        operation,
                        attempts,
                        "Error budget exhausted, giving up"
                    );
                    return Ok(None);
                }
                let delay = config.delay_for(&err);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// [`retry_within_budget`]과 같지만 버짓 소진 시 `T::default()`를 반환합니다.
pub async fn with_retry<T, F, Fut>(
    budget: &ErrorBudget,
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> ExchangeResult<T>
where
    T: Default,
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    Ok(retry_within_budget(budget, config, operation, op)
        .await?
        .unwrap_or_default())
}
