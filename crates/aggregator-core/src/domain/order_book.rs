//! 호가창 스냅샷.

use crate::types::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 호가 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// 가격
    pub price: Price,
    /// 수량
    pub quantity: Quantity,
}

impl OrderBookLevel {
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }
}

/// 누적 합계가 포함된 호가 단계 (표시용).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CumulativeLevel {
    pub level: OrderBookLevel,
    /// 거래 통화 누적 수량
    pub sum_quantity: Quantity,
    /// 기준 통화 누적 금액
    pub sum_base: Decimal,
}

/// 깊이가 제한된 호가창 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    /// 매수 호가 (가격 내림차순)
    pub bids: Vec<OrderBookLevel>,
    /// 매도 호가 (가격 오름차순)
    pub asks: Vec<OrderBookLevel>,
    /// 양쪽 모두 비어 있지 않으면 true
    pub tradeable: bool,
}

impl OrderBook {
    /// 각 방향 최대 `depth` 단계로 잘라 스냅샷을 생성합니다.
    pub fn from_levels(
        mut bids: Vec<OrderBookLevel>,
        mut asks: Vec<OrderBookLevel>,
        depth: usize,
    ) -> Self {
        bids.truncate(depth);
        asks.truncate(depth);
        let tradeable = !(bids.is_empty() && asks.is_empty());
        Self {
            bids,
            asks,
            tradeable,
        }
    }

    /// 최우선 매수 호가.
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    /// 최우선 매도 호가.
    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    /// 스프레드 (매도 - 매수).
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// 한 방향의 누적 수량/금액을 계산합니다.
    pub fn cumulative(levels: &[OrderBookLevel]) -> Vec<CumulativeLevel> {
        let mut sum_quantity = Decimal::ZERO;
        let mut sum_base = Decimal::ZERO;
        levels
            .iter()
            .map(|level| {
                sum_quantity += level.quantity;
                sum_base += level.quantity * level.price;
                CumulativeLevel {
                    level: *level,
                    sum_quantity,
                    sum_base,
                }
            })
            .collect()
    }
}
