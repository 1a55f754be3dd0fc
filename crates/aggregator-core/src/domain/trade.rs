//! 체결 내역, 미체결 주문, 주문 제출 타입.

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 매수/매도 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유효 기간.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// 취소할 때까지 유효
    #[default]
    GoodTillCancelled,
    /// 즉시 체결 후 잔량 취소
    ImmediateOrCancel,
}

/// 마켓 체결 내역 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTrade {
    pub trade_id: String,
    pub side: Side,
    pub time: DateTime<Utc>,
    pub price: Price,
    pub amount: Quantity,
    /// 기준 통화 금액
    pub total: Decimal,
}

impl MarketTrade {
    /// 가격과 수량이 모두 양수인 체결만 유효합니다.
    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.amount > Decimal::ZERO
    }
}

/// 사용자 미체결 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub side: Side,
    pub opened_at: DateTime<Utc>,
    pub price: Price,
    pub amount: Quantity,
    pub total: Decimal,
    pub amount_remaining: Quantity,
}

impl OpenOrder {
    /// 이미 체결된 수량.
    pub fn filled_amount(&self) -> Quantity {
        self.amount - self.amount_remaining
    }
}

/// 지정가 주문 제출 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub side: Side,
    /// 거래소 네이티브 심볼
    pub native_symbol: String,
    pub price: Price,
    pub amount: Quantity,
    pub time_in_force: TimeInForce,
}

/// 주문 제출 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSubmission {
    /// 체결된 수량
    pub filled_amount: Quantity,
    /// 거래소 주문 식별자
    pub order_id: String,
}
