//! 소켓 연결 상태.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 재연결 채널의 연결 상태.
///
/// 재시도 한도를 넘긴 뒤의 `Closed`는 종료 상태이며 더 이상 전이하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// 최초 연결 중
    #[default]
    Connecting,
    /// 연결됨
    Open,
    /// 닫힘
    Closed,
    /// 백오프 대기 후 재연결 중
    Reconnecting,
}

impl ConnectionState {
    /// 푸시 메시지를 받을 수 있는 상태인지 확인합니다.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// 연결을 시도하는 중인지 확인합니다 ("재연결 중…" 표시용).
    pub fn is_pending(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert!(ConnectionState::Open.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(ConnectionState::Reconnecting.is_pending());
        assert!(!ConnectionState::Closed.is_pending());
        assert_eq!(
            serde_json::to_string(&ConnectionState::Reconnecting).unwrap(),
            "\"reconnecting\""
        );
    }
}
