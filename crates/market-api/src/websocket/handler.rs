//! WebSocket 연결 handler.
//!
//! Axum WebSocket 엔드포인트 및 메시지 처리.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use market_core::Symbol;
use market_sync::{MarketFeed, MarketPage, TickerFeed};

use super::messages::{ClientMessage, MarketFrame, ServerMessage, TickersFrame};
use crate::error::ProxyError;
use crate::state::AppState;

type WsSender = SplitSink<WebSocket, Message>;

/// 메시지 하나를 보냅니다. 연결이 끊겼으면 `false`.
async fn send(sender: &mut WsSender, msg: &ServerMessage) -> bool {
    match msg.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "메시지 직렬화 실패");
            true
        }
    }
}

fn welcome(session_id: Uuid) -> ServerMessage {
    ServerMessage::Welcome {
        session_id: session_id.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

// ============================================================================
// /ws/market
// ============================================================================

/// 심볼 피드 WebSocket 업그레이드 핸들러.
///
/// `GET /ws/market`
pub async fn market_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_market_socket(socket, state))
}

enum MarketEvent {
    Client(Option<Result<Message, axum::Error>>),
    Feed(bool),
    Shutdown,
}

/// 구독 중일 때만 피드 변경을 기다립니다. 발행자가 사라지면 `false`.
async fn feed_changed(feed: &mut Option<watch::Receiver<MarketFeed>>) -> bool {
    match feed {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

/// 심볼 피드 연결 처리. 연결 하나가 페이지 하나입니다.
async fn handle_market_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    info!(%session_id, "market WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut page = MarketPage::new(state.registry.clone());
    let mut feed: Option<watch::Receiver<MarketFeed>> = None;

    if !send(&mut sender, &welcome(session_id)).await {
        return;
    }

    loop {
        let event = tokio::select! {
            _ = state.shutdown.cancelled() => MarketEvent::Shutdown,
            msg = receiver.next() => MarketEvent::Client(msg),
            alive = feed_changed(&mut feed) => MarketEvent::Feed(alive),
        };

        let replies = match event {
            MarketEvent::Shutdown => break,
            MarketEvent::Client(Some(Ok(msg))) => match msg {
                Message::Text(text) => {
                    handle_market_message(text.as_str(), &mut page, &mut feed)
                }
                Message::Close(_) => {
                    debug!(%session_id, "close message received");
                    break;
                }
                _ => continue,
            },
            MarketEvent::Client(Some(Err(e))) => {
                warn!(%session_id, error = %e, "WebSocket receive error");
                break;
            }
            MarketEvent::Client(None) => break,
            MarketEvent::Feed(true) => match feed.as_mut() {
                Some(rx) => vec![ServerMessage::Market(MarketFrame::from(&*rx.borrow_and_update()))],
                None => continue,
            },
            MarketEvent::Feed(false) => {
                feed = None;
                continue;
            }
        };

        let mut open = true;
        for reply in &replies {
            if !send(&mut sender, reply).await {
                open = false;
                break;
            }
        }
        if !open {
            break;
        }
    }

    page.unmount();
    info!(%session_id, "market WebSocket disconnected");
}

/// 클라이언트 메시지 하나를 처리하고 보낼 응답을 반환합니다.
fn handle_market_message(
    text: &str,
    page: &mut MarketPage,
    feed: &mut Option<watch::Receiver<MarketFeed>>,
) -> Vec<ServerMessage> {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => return vec![ServerMessage::error("INVALID_MESSAGE", e.to_string())],
    };

    match msg {
        ClientMessage::Subscribe { symbol } => {
            let symbol = match Symbol::parse(&symbol) {
                Ok(symbol) => symbol,
                Err(e) => return vec![ServerMessage::error("INVALID_SYMBOL", e.to_string())],
            };
            let mut rx = page.switch_symbol(symbol.clone());
            let frame = MarketFrame::from(&*rx.borrow_and_update());
            *feed = Some(rx);
            vec![
                ServerMessage::Subscribed {
                    symbol: symbol.to_string(),
                },
                ServerMessage::Market(frame),
            ]
        }
        ClientMessage::Unsubscribe => {
            page.unmount();
            *feed = None;
            vec![ServerMessage::Unsubscribed]
        }
        ClientMessage::Ping => vec![ServerMessage::pong()],
    }
}

// ============================================================================
// /ws/tickers
// ============================================================================

/// 티커 스트림 파라미터.
#[derive(Debug, Default, Deserialize)]
pub struct TickersQuery {
    /// 쉼표로 구분한 심볼. 없으면 관심 목록.
    pub symbols: Option<String>,
}

impl TickersQuery {
    fn parse_symbols(&self) -> Result<Vec<Symbol>, ProxyError> {
        let Some(raw) = self.symbols.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Symbol::parse(s).map_err(|e| ProxyError::BadRequest(e.to_string())))
            .collect()
    }
}

/// 티커 맵 WebSocket 업그레이드 핸들러.
///
/// `GET /ws/tickers?symbols=BTCUSDT,ETHUSDT`
pub async fn tickers_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<TickersQuery>,
) -> Response {
    let symbols = match query.parse_symbols() {
        Ok(symbols) => symbols,
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_tickers_socket(socket, state, symbols))
}

enum TickersEvent {
    Client(Option<Result<Message, axum::Error>>),
    Feed(bool),
    Shutdown,
}

async fn handle_tickers_socket(socket: WebSocket, state: Arc<AppState>, requested: Vec<Symbol>) {
    let session_id = Uuid::new_v4();
    let symbols = state.tickers.resolve(requested);
    let names: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    info!(%session_id, symbols = names.len(), "tickers WebSocket connected");

    let mut rx: watch::Receiver<TickerFeed> = state.tickers.join(session_id, symbols);
    let (mut sender, mut receiver) = socket.split();
    let mut last_sent: Option<TickersFrame> = None;

    if send(&mut sender, &welcome(session_id)).await {
        // 첫 프레임은 현재 상태를 그대로
        rx.mark_changed();

        loop {
            let event = tokio::select! {
                _ = state.shutdown.cancelled() => TickersEvent::Shutdown,
                msg = receiver.next() => TickersEvent::Client(msg),
                changed = rx.changed() => TickersEvent::Feed(changed.is_ok()),
            };

            let reply = match event {
                TickersEvent::Shutdown | TickersEvent::Feed(false) => break,
                TickersEvent::Client(Some(Ok(Message::Text(text)))) => {
                    match ClientMessage::from_json(text.as_str()) {
                        Ok(ClientMessage::Ping) => ServerMessage::pong(),
                        Ok(_) => ServerMessage::error(
                            "UNSUPPORTED",
                            "ticker stream only accepts ping",
                        ),
                        Err(e) => ServerMessage::error("INVALID_MESSAGE", e.to_string()),
                    }
                }
                TickersEvent::Client(Some(Ok(Message::Close(_)))) => break,
                TickersEvent::Client(Some(Ok(_))) => continue,
                TickersEvent::Client(Some(Err(e))) => {
                    warn!(%session_id, error = %e, "WebSocket receive error");
                    break;
                }
                TickersEvent::Client(None) => break,
                TickersEvent::Feed(true) => {
                    let frame = TickersFrame::filtered(&rx.borrow_and_update(), &names);
                    // 이 세션이 보는 심볼이 바뀌지 않았으면 보내지 않음
                    if last_sent.as_ref() == Some(&frame) {
                        continue;
                    }
                    last_sent = Some(frame.clone());
                    ServerMessage::Tickers(frame)
                }
            };

            if !send(&mut sender, &reply).await {
                break;
            }
        }
    }

    state.tickers.leave(session_id);
    info!(%session_id, "tickers WebSocket disconnected");
}

/// WebSocket 라우터 생성.
pub fn websocket_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market", get(market_ws_handler))
        .route("/tickers", get(tickers_ws_handler))
}
