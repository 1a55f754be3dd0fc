//! 애그리게이터 전반에서 사용되는 공통 타입.

pub mod decimal;
pub mod timeframe;

pub use decimal::*;
pub use timeframe::*;
