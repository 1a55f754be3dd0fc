//! 가격과 수량을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 가격 타입.
pub type Price = Decimal;

/// 수량 타입.
pub type Quantity = Decimal;

/// 거래소가 별도 값을 주지 않을 때 사용하는 최소 증분 (1e-8).
pub const MIN_INCREMENT: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// `10^-precision` 값을 반환합니다.
///
/// 거래소가 자릿수만 알려줄 때 증분으로 변환하는 데 사용합니다.
pub fn increment_from_precision(precision: u32) -> Decimal {
    Decimal::new(1, precision.min(28))
}
