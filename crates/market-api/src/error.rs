//! 프록시 에러 응답.
//!
//! 모든 에러는 `{"error": "..."}` 본문으로 응답합니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use market_exchange::ExchangeError;

/// 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

impl ApiErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// 프록시 엔드포인트 에러.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 필수 파라미터 누락 또는 잘못된 값
    #[error("{0}")]
    BadRequest(String),

    /// 거래소 응답 시간 초과
    #[error("Request to Binance API timed out after {0} seconds.")]
    UpstreamTimeout(u64),

    /// 거래소 요청 한도 초과
    #[error("{0}")]
    UpstreamRateLimited(String),

    /// 거래소 연결 불가
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// 거래소가 2xx가 아닌 상태를 반환
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    /// 거래소 에러를 프록시 응답으로 옮깁니다.
    pub fn upstream(err: ExchangeError, timeout: Duration) -> Self {
        match err {
            ExchangeError::Timeout(_) => ProxyError::UpstreamTimeout(timeout.as_secs()),
            ExchangeError::RateLimited(message) => ProxyError::UpstreamRateLimited(message),
            ExchangeError::Network(message) => ProxyError::UpstreamUnavailable(message),
            ExchangeError::Api { status, message } => ProxyError::Upstream { status, message },
            other => ProxyError::Internal(other.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamRateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "프록시 요청 실패");
        } else {
            warn!(status = status.as_u16(), error = %self, "프록시 요청 거부");
        }
        (status, Json(ApiErrorResponse::new(self.to_string()))).into_response()
    }
}

/// 프록시 핸들러 Result 타입.
pub type ProxyResult<T> = Result<T, ProxyError>;
