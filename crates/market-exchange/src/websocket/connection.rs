//! 푸시 연결 전송 계층.
//!
//! 채널은 `Transport`를 통해서만 연결을 열기 때문에 테스트에서는 스크립트된
//! 전송 계층으로 바꿔 끼울 수 있습니다.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{ExchangeError, ExchangeResult};

/// 열린 연결 하나.
#[async_trait]
pub trait Connection: Send {
    /// 다음 텍스트 프레임.
    ///
    /// 정상 종료면 `None`, 전송 에러면 `Some(Err)`를 반환합니다.
    async fn next_text(&mut self) -> Option<ExchangeResult<String>>;

    /// 연결을 닫습니다. 실패는 무시합니다.
    async fn close(&mut self);
}

/// 연결 생성기.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> ExchangeResult<Box<dyn Connection>>;
}

/// tokio-tungstenite 기반 전송 계층.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> ExchangeResult<Box<dyn Connection>> {
        let (ws, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "WebSocket 연결됨");
        Ok(Box::new(TungsteniteConnection { ws }))
    }
}

struct TungsteniteConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for TungsteniteConnection {
    async fn next_text(&mut self) -> Option<ExchangeResult<String>> {
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "서버가 연결을 닫음");
                    return None;
                }
                // Pong 응답은 tungstenite가 처리
                Ok(other) => trace!(kind = ?std::mem::discriminant(&other), "텍스트 외 프레임 무시"),
                Err(e) => return Some(Err(ExchangeError::from(e))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "연결 종료 중 에러");
        }
    }
}
