//! 캔들스틱 간격 정의.
//!
//! 거래소마다 지원하는 네이티브 간격이 다르므로, 어댑터는 자신이 지원하는
//! `Timeframe` 목록을 선언하고 리샘플러는 분 단위 값만 사용합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AggregatorError;

/// 캔들스틱 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 6시간봉
    H6,
    /// 8시간봉
    H8,
    /// 12시간봉
    H12,
    /// 일봉
    D1,
    /// 3일봉
    D3,
    /// 주봉
    W1,
    /// 월봉 (30일 근사)
    MN1,
}

impl Timeframe {
    /// 모든 간격 (짧은 순).
    pub const ALL: [Timeframe; 15] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
        Timeframe::MN1,
    ];

    /// 분 단위 값을 반환합니다.
    pub fn as_minutes(&self) -> u64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 2 * 60,
            Timeframe::H4 => 4 * 60,
            Timeframe::H6 => 6 * 60,
            Timeframe::H8 => 8 * 60,
            Timeframe::H12 => 12 * 60,
            Timeframe::D1 => 24 * 60,
            Timeframe::D3 => 3 * 24 * 60,
            Timeframe::W1 => 7 * 24 * 60,
            Timeframe::MN1 => 30 * 24 * 60,
        }
    }

    /// 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.as_minutes() * 60
    }

    /// 간격의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// 분 단위 값과 정확히 일치하는 간격을 찾습니다.
    pub fn from_minutes(minutes: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|tf| tf.as_minutes() == minutes)
    }

    /// 바이낸스 간격 문자열로 변환합니다.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H8 => "8h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::D3 => "3d",
            Timeframe::W1 => "1w",
            Timeframe::MN1 => "1M",
        }
    }

    /// 바이낸스 간격 문자열에서 파싱합니다.
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.to_binance_interval() == s)
    }

    /// 비트렉스 tickInterval 문자열로 변환합니다.
    ///
    /// 비트렉스가 제공하지 않는 간격이면 `None`.
    pub fn to_bittrex_interval(&self) -> Option<&'static str> {
        match self {
            Timeframe::M1 => Some("oneMin"),
            Timeframe::M5 => Some("fiveMin"),
            Timeframe::M30 => Some("thirtyMin"),
            Timeframe::H1 => Some("hour"),
            Timeframe::D1 => Some("day"),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_interval())
    }
}

impl FromStr for Timeframe {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s)
            .ok_or_else(|| AggregatorError::InvalidInput(format!("timeframe {}", s)))
    }
}
