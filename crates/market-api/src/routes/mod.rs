//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness + 활성 심볼)
//! - `/candles` - 과거 캔들 프록시
//! - `/symbols` - 거래 가능 심볼 프록시
//! - `/ws/market` - 심볼 피드 WebSocket
//! - `/ws/tickers` - 티커 맵 WebSocket

pub mod candles;
pub mod health;
pub mod symbols;

pub use candles::{candles_router, CandlesQuery};
pub use health::{health_router, HealthResponse};
pub use symbols::symbols_router;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;
use crate::websocket::websocket_router;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .merge(candles_router())
        .merge(symbols_router())
        .nest("/ws", websocket_router())
}
