//! 거래소 연결 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Binance 공개 REST 클라이언트 (24h 통계, 호가, 캔들, 심볼 메타데이터)
//! - 결합 스트림/미니 티커 푸시 메시지 파싱
//! - 지수 백오프로 재연결하는 소켓 채널
//! - 테스트 더블 (`test-utils` 기능)

pub mod connector;
pub mod error;
pub mod traits;
pub mod websocket;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use connector::{BinanceClient, ExchangeInfo, SymbolInfo};
pub use error::*;
pub use traits::*;
pub use websocket::*;
