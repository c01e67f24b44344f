//! WebSocket 메시지 타입.
//!
//! 클라이언트-서버 간 교환되는 메시지 정의.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use market_core::{ConnectionState, MarketViewModel, MiniTicker};
use market_sync::{MarketFeed, TickerFeed};

/// WebSocket 에러.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("잘못된 메시지 형식: {0}")]
    InvalidMessage(String),
    #[error("직렬화 실패: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// ==================== 클라이언트 → 서버 메시지 ====================

/// 클라이언트에서 서버로 보내는 메시지.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 심볼 구독 (이전 심볼은 해제)
    Subscribe { symbol: String },
    /// 구독 해제
    Unsubscribe,
    /// 핑 (연결 유지)
    Ping,
}

impl ClientMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        serde_json::from_str(json).map_err(|e| WsError::InvalidMessage(e.to_string()))
    }
}

// ==================== 서버 → 클라이언트 메시지 ====================

/// 심볼 피드 프레임.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFrame {
    pub symbol: Option<String>,
    pub connection: ConnectionState,
    pub is_connected: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub view: Option<MarketViewModel>,
}

impl From<&MarketFeed> for MarketFrame {
    fn from(feed: &MarketFeed) -> Self {
        Self {
            symbol: feed.symbol.as_ref().map(|s| s.to_string()),
            connection: feed.connection,
            is_connected: feed.is_connected(),
            is_loading: feed.is_loading,
            error: feed.error.clone(),
            view: feed.view.as_deref().cloned(),
        }
    }
}

/// 티커 맵 프레임.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickersFrame {
    pub connection: ConnectionState,
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tickers: BTreeMap<String, MiniTicker>,
}

impl TickersFrame {
    /// 세션이 요청한 심볼만 남깁니다.
    pub fn filtered<S: AsRef<str>>(feed: &TickerFeed, symbols: &[S]) -> Self {
        let tickers = symbols
            .iter()
            .filter_map(|s| feed.tickers.get(s.as_ref()))
            .map(|t| (t.symbol.clone(), t.clone()))
            .collect();
        Self {
            connection: feed.connection,
            is_connected: feed.is_connected(),
            error: feed.error.clone(),
            tickers,
        }
    }
}

/// 서버에서 클라이언트로 보내는 메시지.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 연결 환영 메시지
    Welcome {
        session_id: String,
        version: String,
        timestamp: i64,
    },
    /// 구독 확인
    Subscribed { symbol: String },
    /// 구독 해제 확인
    Unsubscribed,
    /// 심볼 피드 갱신
    Market(MarketFrame),
    /// 티커 맵 갱신
    Tickers(TickersFrame),
    /// 퐁 응답
    Pong { timestamp: i64 },
    /// 에러
    Error { code: String, message: String },
}

impl ServerMessage {
    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::from)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
