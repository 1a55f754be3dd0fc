//! Market data collector.
//!
//! 활성화된 거래소마다 세션을 열고 다음을 제공합니다:
//! - 데몬 모드: 통화/마켓 정의 로드 후 주기적인 시세 폴링과 티커 스트림
//! - 단발성 명령: 활성 마켓 목록, 리샘플링된 차트, 호가창

pub mod commands;
pub mod daemon;
pub mod error;
pub mod stats;

pub use error::{CollectorError, Result};
pub use stats::PollStats;
