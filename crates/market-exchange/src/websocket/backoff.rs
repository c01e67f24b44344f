//! 재연결 백오프 상태 기계.
//!
//! 시도 횟수를 클로저에 가두지 않고 `ReconnectState` 값으로 주고받습니다.
//! 전이 메서드는 `self`를 소비하고 다음 상태를 반환합니다.

use std::time::Duration;

use market_core::{ConnectionState, StreamConfig};

/// 지수 백오프 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// 연속 실패 허용 횟수. 넘기면 포기합니다.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            base: config.reconnect_base(),
            max: config.reconnect_max(),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

/// 연결 종료 후 채널이 취할 행동.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// 대기 후 재연결
    Retry(Duration),
    /// 재시도 한도 초과
    GiveUp,
}

/// 채널의 연결 상태와 연속 실패 횟수.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    pub state: ConnectionState,
    pub attempt: u32,
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectState {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            attempt: 0,
        }
    }

    /// 연결 성공. 시도 횟수를 초기화합니다.
    pub fn on_open(self) -> Self {
        Self {
            state: ConnectionState::Open,
            attempt: 0,
        }
    }

    /// 연결 종료 또는 연결 실패.
    pub fn on_closed(self, policy: &BackoffPolicy) -> (Self, ReconnectDecision) {
        if self.attempt >= policy.max_attempts {
            let next = Self {
                state: ConnectionState::Closed,
                attempt: self.attempt,
            };
            return (next, ReconnectDecision::GiveUp);
        }

        let delay = policy.delay_for(self.attempt);
        let next = Self {
            state: ConnectionState::Reconnecting,
            attempt: self.attempt + 1,
        };
        (next, ReconnectDecision::Retry(delay))
    }
}
