//! 정규화된 시장 도메인 모델.
//!
//! 거래소 어댑터가 만들어내는 데이터는 모두 이 타입들로 변환된 뒤
//! 레지스트리와 리샘플러로 전달됩니다.

pub mod balance;
pub mod candle;
pub mod currency;
pub mod market;
pub mod order_book;
pub mod trade;

pub use balance::*;
pub use candle::*;
pub use currency::*;
pub use market::*;
pub use order_book::*;
pub use trade::*;
