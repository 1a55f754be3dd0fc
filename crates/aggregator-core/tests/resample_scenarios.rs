//! 네이티브 간격 선택과 리샘플링을 함께 사용하는 시나리오 테스트.

use aggregator_core::{resample, select_native_interval, Candle, Timeframe};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BITTREX: [Timeframe; 5] = [
    Timeframe::M1,
    Timeframe::M5,
    Timeframe::M30,
    Timeframe::H1,
    Timeframe::D1,
];

fn five_minute_series(count: i64) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let p = Decimal::from(100 + i);
            Candle::new(i * 300, p, p + dec!(1), p - dec!(1), p, dec!(2), p * dec!(2))
        })
        .collect()
}

/// 15분 요청은 비트렉스에서 5분봉을 3개씩 묶습니다.
#[test]
fn test_home_view_chart_on_bittrex() {
    let native_tf = select_native_interval(&BITTREX, 15).unwrap();
    assert_eq!(native_tf, Timeframe::M5);

    // 하루치 5분봉 288개
    let native = five_minute_series(288);
    let chart = resample(&native, native_tf.as_minutes(), 15, 24 * 60);

    // 마지막 시작 시각 86100, 룩백 하루면 버킷 0부터 포함
    assert_eq!(chart.len(), 96);
    assert!(chart.windows(2).all(|w| w[1].open_time - w[0].open_time == 900));

    let first = chart[0];
    assert_eq!(first.open, dec!(100));
    assert_eq!(first.close, dec!(102));
    assert_eq!(first.high, dec!(103));
    assert_eq!(first.low, dec!(99));
    assert_eq!(first.volume, dec!(6));
}

/// 요청 간격이 네이티브 간격과 같으면 룩백 창만 적용됩니다.
#[test]
fn test_exact_native_interval_is_window_only() {
    let native_tf = select_native_interval(&BITTREX, 5).unwrap();
    let native = five_minute_series(100);
    let chart = resample(&native, native_tf.as_minutes(), 5, 60);

    assert_eq!(chart.len(), 13);
    assert_eq!(chart.last(), native.last());
}

/// 재실행은 이전 호출과 독립적입니다.
#[test]
fn test_recomputed_per_call() {
    let native = five_minute_series(24);
    let hourly = resample(&native, 5, 60, 120);
    let half_hourly = resample(&native, 5, 30, 120);
    let hourly_again = resample(&native, 5, 60, 120);

    assert_eq!(hourly, hourly_again);
    assert_eq!(hourly.len(), 2);
    assert_eq!(half_hourly.len(), 4);
}
