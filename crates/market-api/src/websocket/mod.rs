//! 소비자용 WebSocket 서버.
//!
//! # 엔드포인트
//!
//! - `/ws/market` - 연결 하나가 페이지 하나. 활성 심볼의 뷰 모델을 밀어 줍니다.
//! - `/ws/tickers?symbols=A,B` - 공유 티커 맵 중 요청 심볼만 밀어 줍니다.
//!
//! # 메시지 형식
//!
//! ## 클라이언트 → 서버 (`/ws/market`)
//!
//! ```json
//! {"type": "subscribe", "symbol": "BTCUSDT"}
//! {"type": "unsubscribe"}
//! {"type": "ping"}
//! ```
//!
//! ## 서버 → 클라이언트
//!
//! ```json
//! {"type": "market", "symbol": "BTCUSDT", "connection": "open", "view": {...}}
//! {"type": "tickers", "connection": "open", "tickers": {...}}
//! {"type": "error", "code": "INVALID_SYMBOL", "message": "..."}
//! {"type": "pong", "timestamp": 1700000000000}
//! ```

pub mod handler;
pub mod hub;
pub mod messages;

pub use handler::{market_ws_handler, tickers_ws_handler, websocket_router, TickersQuery};
pub use hub::TickerHub;
pub use messages::{ClientMessage, MarketFrame, ServerMessage, TickersFrame, WsError};
