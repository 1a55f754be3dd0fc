//! 계좌 잔고.

use crate::types::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 사용 가능 잔고 (통화 코드 -> 수량).
pub type AvailableBalances = HashMap<String, Quantity>;

/// 사용 가능/주문 중/총 잔고.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    pub available: Quantity,
    pub on_orders: Quantity,
    pub total: Quantity,
}

impl BalanceBreakdown {
    /// 사용 가능 수량과 묶인 수량으로 생성합니다.
    pub fn from_locked(available: Decimal, locked: Decimal) -> Self {
        Self {
            available,
            on_orders: locked,
            total: available + locked,
        }
    }

    /// 사용 가능 수량과 총 수량으로 생성합니다.
    pub fn from_total(available: Decimal, total: Decimal) -> Self {
        Self {
            available,
            on_orders: total - available,
            total,
        }
    }
}

/// 통화별 전체 잔고.
pub type CompleteBalances = HashMap<String, BalanceBreakdown>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_breakdown() {
        let locked = BalanceBreakdown::from_locked(dec!(1.5), dec!(0.5));
        assert_eq!(locked.total, dec!(2));

        let total = BalanceBreakdown::from_total(dec!(1.5), dec!(2));
        assert_eq!(total.on_orders, dec!(0.5));
        assert_eq!(locked, total);
    }
}
