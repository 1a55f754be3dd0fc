//! 통화 정의.

use crate::types::MIN_INCREMENT;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 글로벌 코드로 식별되는 통화 레코드.
///
/// 삭제되지 않으며, 새 데이터가 도착할 때마다 필드 단위로 병합됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// 글로벌 통화 코드
    pub code: String,
    /// 표시 이름
    pub name: String,
    /// 입금 가능 여부
    pub deposit_enabled: bool,
    /// 출금 가능 여부
    pub withdrawal_enabled: bool,
    /// 공지
    pub notice: String,
    /// 거래소 입금 주소 템플릿
    pub base_address: String,
    /// 최소 컨펌 수
    pub min_confirmations: u32,
    /// 출금 수수료
    pub withdrawal_fee: Decimal,
    /// 최소 출금 수량
    pub withdrawal_min_amount: Decimal,
    /// 수량 정밀도
    pub precision: Decimal,
}

impl Currency {
    /// 기본값으로 새 통화를 생성합니다.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            deposit_enabled: true,
            withdrawal_enabled: true,
            notice: String::new(),
            base_address: String::new(),
            min_confirmations: 0,
            withdrawal_fee: Decimal::ZERO,
            withdrawal_min_amount: Decimal::ZERO,
            precision: MIN_INCREMENT,
        }
    }

    /// 부분 레코드를 병합합니다. 값이 없는 필드는 보존됩니다.
    pub fn apply(&mut self, fields: &CurrencyFields) {
        if let Some(name) = &fields.name {
            self.name = name.clone();
        }
        if let Some(v) = fields.deposit_enabled {
            self.deposit_enabled = v;
        }
        if let Some(v) = fields.withdrawal_enabled {
            self.withdrawal_enabled = v;
        }
        if let Some(notice) = &fields.notice {
            self.notice = notice.clone();
        }
        if let Some(address) = &fields.base_address {
            self.base_address = address.clone();
        }
        if let Some(v) = fields.min_confirmations {
            self.min_confirmations = v;
        }
        if let Some(v) = fields.withdrawal_fee {
            self.withdrawal_fee = v;
        }
        if let Some(v) = fields.withdrawal_min_amount {
            self.withdrawal_min_amount = v;
        }
        if let Some(v) = fields.precision {
            self.precision = v;
        }
    }
}

/// 어댑터가 전달하는 통화 메타데이터 (부분 레코드).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyFields {
    pub name: Option<String>,
    pub deposit_enabled: Option<bool>,
    pub withdrawal_enabled: Option<bool>,
    pub notice: Option<String>,
    pub base_address: Option<String>,
    pub min_confirmations: Option<u32>,
    pub withdrawal_fee: Option<Decimal>,
    pub withdrawal_min_amount: Option<Decimal>,
    pub precision: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_defaults() {
        let c = Currency::new("BTC");
        assert_eq!(c.name, "BTC");
        assert!(c.deposit_enabled);
        assert_eq!(c.precision, dec!(0.00000001));
    }

    #[test]
    fn test_currency_apply_preserves_unset() {
        let mut c = Currency::new("BTC");
        c.apply(&CurrencyFields {
            name: Some("Bitcoin".to_string()),
            withdrawal_fee: Some(dec!(0.0005)),
            ..Default::default()
        });
        c.apply(&CurrencyFields {
            deposit_enabled: Some(false),
            ..Default::default()
        });

        assert_eq!(c.name, "Bitcoin");
        assert_eq!(c.withdrawal_fee, dec!(0.0005));
        assert!(!c.deposit_enabled);
        assert!(c.withdrawal_enabled);
    }
}
