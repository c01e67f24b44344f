//! 재연결 소켓 채널.
//!
//! URL 하나에 대한 물리 연결 하나를 소유합니다. 받은 텍스트 프레임은 수신 순서대로
//! 정확히 한 번 핸들러에 전달되고, 예기치 않은 종료 시 백오프 정책에 따라 재연결합니다.
//!
//! 의도적 종료는 `CancellationToken`으로 요청합니다. 취소가 관측되면 핸들러 콜백을
//! 더 이상 호출하지 않은 채 연결을 닫고 반환하므로 재연결 경로가 열리지 않습니다.
//! 재연결 사이에 놓친 메시지는 버퍼링하지 않으며, 일관성 복구는 `prepare` 훅에서
//! 호출자가 담당합니다.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use market_core::ConnectionState;

use super::backoff::{BackoffPolicy, ReconnectDecision, ReconnectState};
use super::connection::{Connection, Transport};
use crate::error::{ExchangeError, ExchangeResult};

/// 채널 이벤트를 받는 쪽.
#[async_trait]
pub trait ChannelHandler: Send {
    /// 재연결 직전에 호출됩니다 (`attempt`는 1부터).
    ///
    /// 재시도 가능한 에러를 반환하면 실패한 연결 시도로 계산되고,
    /// 재시도 불가능한 에러면 채널이 `PrepareFailed`로 종료됩니다.
    async fn prepare(&mut self, attempt: u32) -> ExchangeResult<()> {
        let _ = attempt;
        Ok(())
    }

    /// 연결 상태 전이.
    fn on_state(&mut self, state: ConnectionState, attempt: u32);

    /// 텍스트 프레임 하나.
    fn on_message(&mut self, text: &str);

    /// 전송 에러 또는 연결 실패.
    fn on_error(&mut self, error: &ExchangeError) {
        let _ = error;
    }
}

/// `run`이 반환한 이유.
#[derive(Debug, Clone)]
pub enum ChannelExit {
    /// 호출자가 취소함
    Cancelled,
    /// 재시도 한도 초과
    GaveUp,
    /// 재연결 준비 단계의 복구 불가능한 실패
    PrepareFailed(ExchangeError),
}

/// 재연결 소켓 채널.
pub struct ReconnectingChannel {
    name: String,
    url: String,
    transport: Arc<dyn Transport>,
    policy: BackoffPolicy,
}

impl ReconnectingChannel {
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>, policy: BackoffPolicy) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            url,
            transport,
            policy,
        }
    }

    /// 로그에 표시할 이름을 지정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 취소되거나 재시도 한도를 넘길 때까지 연결을 유지합니다.
    pub async fn run<H>(&self, handler: &mut H, cancel: &CancellationToken) -> ChannelExit
    where
        H: ChannelHandler + ?Sized,
    {
        let mut reconnect = ReconnectState::new();
        handler.on_state(reconnect.state, reconnect.attempt);

        loop {
            if cancel.is_cancelled() {
                return ChannelExit::Cancelled;
            }

            let ready = if reconnect.state == ConnectionState::Reconnecting {
                let prepared = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ChannelExit::Cancelled,
                    result = handler.prepare(reconnect.attempt) => result,
                };
                match prepared {
                    Ok(()) => true,
                    Err(e) if !e.is_retryable() => {
                        warn!(channel = %self.name, error = %e, "재연결 준비 실패, 채널 종료");
                        handler.on_error(&e);
                        handler.on_state(ConnectionState::Closed, reconnect.attempt);
                        return ChannelExit::PrepareFailed(e);
                    }
                    Err(e) => {
                        warn!(channel = %self.name, attempt = reconnect.attempt, error = %e, "재연결 준비 실패");
                        handler.on_error(&e);
                        false
                    }
                }
            } else {
                true
            };

            if ready {
                let connected = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ChannelExit::Cancelled,
                    result = self.transport.connect(&self.url) => result,
                };

                match connected {
                    Ok(mut connection) => {
                        reconnect = reconnect.on_open();
                        info!(channel = %self.name, "채널 연결됨");
                        handler.on_state(reconnect.state, reconnect.attempt);

                        if self.pump(connection.as_mut(), handler, cancel).await {
                            connection.close().await;
                            debug!(channel = %self.name, "채널 의도적 종료");
                            return ChannelExit::Cancelled;
                        }
                    }
                    Err(e) => {
                        warn!(channel = %self.name, attempt = reconnect.attempt, error = %e, "연결 실패");
                        handler.on_error(&e);
                    }
                }
            }

            let (next, decision) = reconnect.on_closed(&self.policy);
            reconnect = next;

            match decision {
                ReconnectDecision::GiveUp => {
                    warn!(
                        channel = %self.name,
                        attempts = reconnect.attempt,
                        "재연결 한도 초과, 채널 종료"
                    );
                    handler.on_state(reconnect.state, reconnect.attempt);
                    return ChannelExit::GaveUp;
                }
                ReconnectDecision::Retry(delay) => {
                    info!(
                        channel = %self.name,
                        attempt = reconnect.attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "재연결 예약"
                    );
                    handler.on_state(reconnect.state, reconnect.attempt);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return ChannelExit::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// 연결이 끊기거나 취소될 때까지 프레임을 전달합니다. 취소면 `true`.
    async fn pump<H>(
        &self,
        connection: &mut dyn Connection,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> bool
    where
        H: ChannelHandler + ?Sized,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return true,
                frame = connection.next_text() => frame,
            };

            match frame {
                Some(Ok(text)) => {
                    trace!(channel = %self.name, len = text.len(), "프레임 수신");
                    handler.on_message(&text);
                }
                Some(Err(e)) => {
                    warn!(channel = %self.name, error = %e, "채널 에러");
                    handler.on_error(&e);
                    return false;
                }
                None => {
                    info!(channel = %self.name, "채널 연결 종료됨");
                    return false;
                }
            }
        }
    }
}
