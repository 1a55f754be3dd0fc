//! 마켓 레코드와 부분 갱신 타입.
//!
//! 마켓은 (기준 통화, 거래 통화) 글로벌 코드 쌍으로 식별됩니다.
//! 예를 들어 바이낸스 `ETHBTC`는 기준 통화 `BTC`, 거래 통화 `ETH`입니다.

use crate::types::{Price, Quantity, MIN_INCREMENT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 마켓 키 (기준 통화, 거래 통화).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    /// 기준(가격 표시) 통화
    pub base: String,
    /// 거래 통화
    pub curr: String,
}

impl MarketKey {
    pub fn new(base: impl Into<String>, curr: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            curr: curr.into(),
        }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.curr)
    }
}

/// 정규화된 마켓 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// 거래소 네이티브 심볼 (예: "ETHBTC", "BTC-LTC")
    pub native_symbol: String,
    /// 기준 통화 최소 수량
    pub base_min_amount: Quantity,
    /// 기준 통화 수량 증분
    pub base_increment: Quantity,
    /// 거래 통화 최소 수량
    pub curr_min_amount: Quantity,
    /// 거래 통화 수량 증분
    pub curr_increment: Quantity,
    /// 최소 가격
    pub price_min: Price,
    /// 가격 증분 (틱 크기)
    pub price_increment: Price,
    /// 거래소가 보고한 활성 여부
    pub is_active: bool,
    /// 거래 제한 여부
    pub is_restricted: bool,
    /// 공지
    pub notice: String,
    /// 마켓 생성 시각
    pub created: Option<DateTime<Utc>>,
    /// 로고 URL
    pub logo_url: Option<String>,
    /// 최우선 매수 호가
    pub best_bid: Option<Price>,
    /// 최우선 매도 호가
    pub best_ask: Option<Price>,
    /// 최우선 매수 잔량
    pub best_bid_size: Option<Quantity>,
    /// 최우선 매도 잔량
    pub best_ask_size: Option<Quantity>,
    /// 24시간 거래대금 (기준 통화)
    pub base_volume: Option<Decimal>,
    /// 24시간 거래량 (거래 통화)
    pub curr_volume: Option<Decimal>,
    /// 24시간 고가
    pub high_24h: Option<Price>,
    /// 24시간 저가
    pub low_24h: Option<Price>,
    /// 24시간 변동률 (%)
    pub percent_move_24h: Option<Decimal>,
    /// 최근 체결가
    pub last_price: Option<Price>,
    /// 마지막 갱신 시각
    pub timestamp: Option<DateTime<Utc>>,
}

impl Market {
    /// 기본 레코드를 생성합니다.
    ///
    /// 모든 증분은 1e-8, 최소값은 0, 활성/비제한 상태로 시작합니다.
    pub fn new(native_symbol: impl Into<String>) -> Self {
        Self {
            native_symbol: native_symbol.into(),
            base_min_amount: Decimal::ZERO,
            base_increment: MIN_INCREMENT,
            curr_min_amount: Decimal::ZERO,
            curr_increment: MIN_INCREMENT,
            price_min: Decimal::ZERO,
            price_increment: MIN_INCREMENT,
            is_active: true,
            is_restricted: false,
            notice: String::new(),
            created: None,
            logo_url: None,
            best_bid: None,
            best_ask: None,
            best_bid_size: None,
            best_ask_size: None,
            base_volume: None,
            curr_volume: None,
            high_24h: None,
            low_24h: None,
            percent_move_24h: None,
            last_price: None,
            timestamp: None,
        }
    }

    /// 활성 마켓 집합에 속할 자격이 있는지 확인합니다.
    pub fn is_tradeable(&self) -> bool {
        self.is_active && !self.is_restricted
    }

    /// 호가 중간값을 반환합니다.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}

/// 마켓 부분 레코드.
///
/// `None` 필드는 "이번 갱신에 포함되지 않음"을 의미하며 기존 값을 보존합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFields {
    pub base_min_amount: Option<Quantity>,
    pub base_increment: Option<Quantity>,
    pub curr_min_amount: Option<Quantity>,
    pub curr_increment: Option<Quantity>,
    pub price_min: Option<Price>,
    pub price_increment: Option<Price>,
    pub is_active: Option<bool>,
    pub is_restricted: Option<bool>,
    pub notice: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub logo_url: Option<String>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub best_bid_size: Option<Quantity>,
    pub best_ask_size: Option<Quantity>,
    pub base_volume: Option<Decimal>,
    pub curr_volume: Option<Decimal>,
    pub high_24h: Option<Price>,
    pub low_24h: Option<Price>,
    pub percent_move_24h: Option<Decimal>,
    pub last_price: Option<Price>,
    pub timestamp: Option<DateTime<Utc>>,
}

macro_rules! merge_fields {
    ($src:expr, $dst:expr; $($field:ident),* ; $($opt:ident),*) => {
        $(
            if let Some(v) = &$src.$field {
                $dst.$field = v.clone();
            }
        )*
        $(
            if $src.$opt.is_some() {
                $dst.$opt = $src.$opt.clone();
            }
        )*
    };
}

impl MarketFields {
    /// 값이 있는 필드만 레코드에 덮어씁니다.
    pub fn apply_to(&self, market: &mut Market) {
        merge_fields!(self, market;
            base_min_amount, base_increment, curr_min_amount, curr_increment,
            price_min, price_increment, is_active, is_restricted, notice;
            created, logo_url, best_bid, best_ask, best_bid_size, best_ask_size,
            base_volume, curr_volume, high_24h, low_24h, percent_move_24h,
            last_price, timestamp
        );
    }

    /// 갱신할 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 호가 필드만 채운 부분 레코드를 생성합니다.
    pub fn quote(bid: Price, bid_size: Quantity, ask: Price, ask_size: Quantity) -> Self {
        Self {
            best_bid: Some(bid),
            best_bid_size: Some(bid_size),
            best_ask: Some(ask),
            best_ask_size: Some(ask_size),
            ..Default::default()
        }
    }
}

impl From<&Market> for MarketFields {
    /// 레코드 전체를 부분 레코드로 변환합니다. 비어 있는 선택 필드는 `None`으로 남습니다.
    fn from(market: &Market) -> Self {
        Self {
            base_min_amount: Some(market.base_min_amount),
            base_increment: Some(market.base_increment),
            curr_min_amount: Some(market.curr_min_amount),
            curr_increment: Some(market.curr_increment),
            price_min: Some(market.price_min),
            price_increment: Some(market.price_increment),
            is_active: Some(market.is_active),
            is_restricted: Some(market.is_restricted),
            notice: Some(market.notice.clone()),
            created: market.created,
            logo_url: market.logo_url.clone(),
            best_bid: market.best_bid,
            best_ask: market.best_ask,
            best_bid_size: market.best_bid_size,
            best_ask_size: market.best_ask_size,
            base_volume: market.base_volume,
            curr_volume: market.curr_volume,
            high_24h: market.high_24h,
            low_24h: market.low_24h,
            percent_move_24h: market.percent_move_24h,
            last_price: market.last_price,
            timestamp: market.timestamp,
        }
    }
}

/// 어댑터가 생산하는 마켓 갱신 단위.
///
/// 마켓 정의 갱신은 로컬 코드를 포함하고, 시세/24시간 갱신은 심볼만 포함합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketUpdate {
    /// 거래소 네이티브 심볼
    pub native_symbol: String,
    /// 기준 통화 로컬 코드
    pub local_base: Option<String>,
    /// 거래 통화 로컬 코드
    pub local_curr: Option<String>,
    /// 갱신할 필드
    pub fields: MarketFields,
}

impl MarketUpdate {
    /// 마켓 정의 갱신 (로컬 코드 포함).
    pub fn definition(
        native_symbol: impl Into<String>,
        local_base: impl Into<String>,
        local_curr: impl Into<String>,
        fields: MarketFields,
    ) -> Self {
        Self {
            native_symbol: native_symbol.into(),
            local_base: Some(local_base.into()),
            local_curr: Some(local_curr.into()),
            fields,
        }
    }

    /// 심볼만으로 식별되는 갱신.
    pub fn for_symbol(native_symbol: impl Into<String>, fields: MarketFields) -> Self {
        Self {
            native_symbol: native_symbol.into(),
            local_base: None,
            local_curr: None,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_defaults() {
        let m = Market::new("ETHBTC");
        assert_eq!(m.base_increment, dec!(0.00000001));
        assert_eq!(m.curr_min_amount, Decimal::ZERO);
        assert!(m.is_tradeable());
        assert!(m.notice.is_empty());
    }

    #[test]
    fn test_apply_keeps_unset_fields() {
        let mut m = Market::new("ETHBTC");
        MarketFields {
            is_active: Some(false),
            ..Default::default()
        }
        .apply_to(&mut m);
        MarketFields {
            best_bid: Some(dec!(0.033)),
            ..Default::default()
        }
        .apply_to(&mut m);

        assert!(!m.is_active);
        assert_eq!(m.best_bid, Some(dec!(0.033)));
        assert!(!m.is_tradeable());
    }

    #[test]
    fn test_mid_price() {
        let mut m = Market::new("ETHBTC");
        assert_eq!(m.mid_price(), None);
        MarketFields::quote(dec!(1), dec!(5), dec!(3), dec!(2)).apply_to(&mut m);
        assert_eq!(m.mid_price(), Some(dec!(2)));
    }

    #[test]
    fn test_market_key_display() {
        assert_eq!(MarketKey::new("BTC", "ETH").to_string(), "BTC-ETH");
    }
}
