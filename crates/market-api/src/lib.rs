//! 시세 프록시 및 실시간 피드 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 과거 캔들 / 거래 가능 심볼 REST 프록시
//! - 심볼 피드(`/ws/market`)와 티커 맵(`/ws/tickers`) WebSocket 엔드포인트
//! - 헬스 체크 엔드포인트
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`cache`]: 심볼 목록 TTL 캐시
//! - [`websocket`]: 실시간 WebSocket 서버

pub mod cache;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use cache::{CacheStatus, SymbolCache, SymbolLookup, SymbolSource};
pub use error::{ApiErrorResponse, ProxyError, ProxyResult};
pub use routes::*;
pub use state::AppState;
pub use websocket::{
    market_ws_handler, tickers_ws_handler, websocket_router, ClientMessage, ServerMessage,
    TickerHub, WsError,
};

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
