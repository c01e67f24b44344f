//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 REST/WebSocket 에러.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// 요청 한도 초과 (HTTP 429)
    #[error("요청 한도 초과: {0}")]
    RateLimited(String),

    /// 거래소가 2xx가 아닌 응답을 반환
    #[error("API 에러 {status}: {message}")]
    Api { status: u16, message: String },

    /// 파싱/역직렬화 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// WebSocket 에러
    #[error("WebSocket 에러: {0}")]
    WebSocket(String),

    /// 연결 끊김
    #[error("연결 끊김: {0}")]
    Disconnected(String),

    /// 알 수 없는 에러
    #[error("알 수 없는 에러: {0}")]
    Unknown(String),
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    /// 같은 요청을 다시 보내면 성공할 수 있는 에러인지 확인.
    ///
    /// 4xx API 에러(잘못된 심볼 등)와 파싱 에러는 재시도해도 바뀌지 않습니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Network(_)
            | ExchangeError::Timeout(_)
            | ExchangeError::RateLimited(_)
            | ExchangeError::WebSocket(_)
            | ExchangeError::Disconnected(_) => true,
            ExchangeError::Api { status, .. } => *status >= 500,
            ExchangeError::Parse(_) | ExchangeError::Unknown(_) => false,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::Network(err.to_string())
        } else if err.is_decode() {
            ExchangeError::Parse(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ExchangeError::Timeout("10s".into()).is_retryable());
        assert!(ExchangeError::RateLimited("slow down".into()).is_retryable());
        assert!(ExchangeError::Api {
            status: 503,
            message: "maintenance".into()
        }
        .is_retryable());
        assert!(!ExchangeError::Api {
            status: 400,
            message: "Invalid symbol.".into()
        }
        .is_retryable());
        assert!(!ExchangeError::Parse("eof".into()).is_retryable());
    }
}
