//! OHLCV 캔들.

use crate::types::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들스틱.
///
/// 시퀀스는 `open_time` 오름차순이며, 같은 시작 시각의 캔들은 하나뿐이라고 가정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 버킷 시작 시각 (Unix 초)
    pub open_time: i64,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (거래 통화 단위)
    pub volume: Quantity,
    /// 거래대금 (기준 통화 단위)
    pub base_volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        open_time: i64,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
        base_volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            base_volume,
        }
    }

    /// 다음 캔들을 같은 버킷으로 병합합니다.
    ///
    /// 시가는 유지, 고가/저가는 극값, 종가는 마지막 값, 거래량은 합산합니다.
    pub fn absorb(&mut self, next: &Candle) {
        self.high = self.high.max(next.high);
        self.low = self.low.min(next.low);
        self.close = next.close;
        self.volume += next.volume;
        self.base_volume += next.base_volume;
    }
}

/// 캔들 조회 범위.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KlineRange {
    /// 시작 시각 (Unix 초, 포함)
    pub start: Option<i64>,
    /// 종료 시각 (Unix 초, 포함)
    pub end: Option<i64>,
    /// 최대 캔들 수
    pub limit: Option<u32>,
}

impl KlineRange {
    /// 최근 `lookback_minutes` 분을 덮는 범위를 생성합니다.
    ///
    /// 기간이 너무 길면 시작 시각은 `i64::MIN`에 고정됩니다.
    pub fn lookback(now: i64, lookback_minutes: u64) -> Self {
        let seconds = i64::try_from(lookback_minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(60);
        Self {
            start: Some(now.saturating_sub(seconds)),
            end: None,
            limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_absorb() {
        let mut first = Candle::new(0, dec!(1), dec!(10), dec!(5), dec!(7), dec!(1), dec!(2));
        let second = Candle::new(60, dec!(7), dec!(12), dec!(6), dec!(8), dec!(3), dec!(4));
        first.absorb(&second);

        assert_eq!(first.open_time, 0);
        assert_eq!(first.open, dec!(1));
        assert_eq!(first.high, dec!(12));
        assert_eq!(first.low, dec!(5));
        assert_eq!(first.close, dec!(8));
        assert_eq!(first.volume, dec!(4));
        assert_eq!(first.base_volume, dec!(6));
    }

    #[test]
    fn test_lookback_range() {
        let range = KlineRange::lookback(86_400, 60);
        assert_eq!(range.start, Some(82_800));
        assert_eq!(range.limit, None);
    }

    #[test]
    fn test_lookback_range_saturates() {
        let range = KlineRange::lookback(86_400, u64::MAX / 2);
        assert_eq!(range.start, Some(i64::MIN));

        let range = KlineRange::lookback(86_400, u64::MAX);
        assert_eq!(range.start, Some(i64::MIN));
    }
}
