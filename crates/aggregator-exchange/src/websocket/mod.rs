//! 실시간 스트림.

pub mod binance_ticker;
