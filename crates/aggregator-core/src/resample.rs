//! 네이티브 캔들을 요청 간격으로 변환하는 리샘플러.
//!
//! 1. 거래소 네이티브 간격 중 요청 간격 이하인 가장 큰 간격을 고릅니다.
//!    해당하는 간격이 없으면 가장 작은 네이티브 간격을 사용합니다.
//! 2. 선택한 간격이 요청과 정확히 같으면 룩백 창 안의 캔들을 그대로 돌려줍니다.
//! 3. 그렇지 않으면 `open_time - open_time % (interval * 60)` 버킷으로 집계합니다.
//!
//! 룩백 창은 현재 시각이 아니라 마지막 네이티브 캔들의 시작 시각을 기준으로 합니다.
//! 호출마다 처음부터 다시 계산하며 집계 결과를 캐시하지 않습니다.

use crate::domain::Candle;
use crate::types::Timeframe;
use std::collections::BTreeMap;

/// 요청 간격에 사용할 네이티브 간격을 고릅니다.
///
/// 네이티브 간격 목록이 비어 있으면 `None`.
pub fn select_native_interval(natives: &[Timeframe], requested_minutes: u64) -> Option<Timeframe> {
    let floor = natives
        .iter()
        .filter(|tf| tf.as_minutes() <= requested_minutes)
        .max_by_key(|tf| tf.as_minutes());
    floor
        .or_else(|| natives.iter().min_by_key(|tf| tf.as_minutes()))
        .copied()
}

/// 룩백 창의 시작 시각 (마지막 캔들 기준).
fn window_start(candles: &[Candle], lookback_minutes: u64) -> Option<i64> {
    let last = candles.last()?;
    let lookback_secs = i64::try_from(lookback_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
    Some(last.open_time.saturating_sub(lookback_secs))
}

/// 네이티브 캔들을 요청 간격으로 변환합니다.
///
/// `native` 는 `native_minutes` 간격의 시간순 캔들이어야 합니다.
/// 빈 입력이나 0분 요청은 빈 결과를 반환합니다.
pub fn resample(
    native: &[Candle],
    native_minutes: u64,
    requested_minutes: u64,
    lookback_minutes: u64,
) -> Vec<Candle> {
    if requested_minutes == 0 {
        return Vec::new();
    }
    let Some(cutoff) = window_start(native, lookback_minutes) else {
        return Vec::new();
    };

    if native_minutes == requested_minutes {
        return native
            .iter()
            .filter(|c| c.open_time >= cutoff)
            .copied()
            .collect();
    }

    let width = i64::try_from(requested_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in native {
        let bucket_start = candle.open_time - candle.open_time.rem_euclid(width);
        buckets
            .entry(bucket_start)
            .and_modify(|agg| agg.absorb(candle))
            .or_insert(Candle {
                open_time: bucket_start,
                ..*candle
            });
    }

    buckets.range(cutoff..).map(|(_, candle)| *candle).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const BINANCE: [Timeframe; 15] = Timeframe::ALL;
    const BITTREX: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::D1,
    ];

    fn candle(t: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal, v: Decimal, bv: Decimal) -> Candle {
        Candle::new(t, o, h, l, c, v, bv)
    }

    #[test]
    fn test_select_floor() {
        assert_eq!(select_native_interval(&BITTREX, 15), Some(Timeframe::M5));
        assert_eq!(select_native_interval(&BITTREX, 30), Some(Timeframe::M30));
        assert_eq!(select_native_interval(&BITTREX, 240), Some(Timeframe::H1));
        assert_eq!(select_native_interval(&BINANCE, 15), Some(Timeframe::M15));
        assert_eq!(select_native_interval(&BINANCE, 100_000), Some(Timeframe::MN1));
    }

    #[test]
    fn test_select_below_smallest() {
        let natives = [Timeframe::M5, Timeframe::H1];
        assert_eq!(select_native_interval(&natives, 1), Some(Timeframe::M5));
        assert_eq!(select_native_interval(&[], 5), None);
    }

    #[test]
    fn test_passthrough_on_exact_match() {
        let native = vec![
            candle(0, dec!(1), dec!(2), dec!(0), dec!(1), dec!(10), dec!(5)),
            candle(300, dec!(1), dec!(3), dec!(1), dec!(2), dec!(20), dec!(10)),
        ];
        assert_eq!(resample(&native, 5, 5, 10), native);
    }

    #[test]
    fn test_passthrough_trims_to_lookback() {
        let native: Vec<Candle> = (0..10)
            .map(|i| candle(i * 300, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)))
            .collect();
        let result = resample(&native, 5, 5, 15);
        let times: Vec<i64> = result.iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![1800, 2100, 2400, 2700]);
    }

    #[test]
    fn test_aggregate_three_minutes() {
        let native = vec![
            candle(0, dec!(7), dec!(10), dec!(5), dec!(8), dec!(1), dec!(10)),
            candle(60, dec!(8), dec!(12), dec!(6), dec!(9), dec!(2), dec!(20)),
            candle(120, dec!(9), dec!(9), dec!(4), dec!(6), dec!(3), dec!(30)),
        ];
        let result = resample(&native, 1, 3, 60);
        assert_eq!(
            result,
            vec![candle(0, dec!(7), dec!(12), dec!(4), dec!(6), dec!(6), dec!(60))]
        );
    }

    #[test]
    fn test_aggregate_buckets_and_window() {
        // 5분봉 12개 (0..3300) -> 15분봉 4개, 룩백 30분이면 마지막 3300 기준 1500 이후 버킷
        let native: Vec<Candle> = (0..12)
            .map(|i| {
                let p = Decimal::from(i + 1);
                candle(i * 300, p, p, p, p, dec!(1), p)
            })
            .collect();
        let result = resample(&native, 5, 15, 30);
        let times: Vec<i64> = result.iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![1800, 2700]);
        assert_eq!(result[0].open, dec!(7));
        assert_eq!(result[0].close, dec!(9));
        assert_eq!(result[0].volume, dec!(3));
        assert_eq!(result[1].base_volume, dec!(33));
    }

    #[test]
    fn test_unaligned_native_open_times() {
        let native = vec![
            candle(30, dec!(1), dec!(2), dec!(1), dec!(2), dec!(1), dec!(1)),
            candle(90, dec!(2), dec!(3), dec!(2), dec!(3), dec!(1), dec!(1)),
        ];
        let result = resample(&native, 1, 2, 60);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].open_time, 0);
        assert_eq!(result[0].high, dec!(3));
    }

    #[test]
    fn test_finer_than_native_degenerates() {
        let native = vec![
            candle(0, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1), dec!(1)),
            candle(300, dec!(2), dec!(2), dec!(2), dec!(2), dec!(1), dec!(1)),
        ];
        let result = resample(&native, 5, 1, 60);
        assert_eq!(result, native);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(resample(&[], 5, 15, 60).is_empty());

        let single = vec![candle(900, dec!(1), dec!(2), dec!(0), dec!(1), dec!(3), dec!(4))];
        assert_eq!(resample(&single, 5, 15, 60), single);
        assert!(resample(&single, 5, 0, 60).is_empty());
    }
}
