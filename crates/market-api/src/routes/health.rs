//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템에서 사용하는 liveness 응답에
//! 현재 동기화 중인 심볼과 티커 세션 수를 함께 돌려줍니다.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 서비스 상태 ("healthy")
    pub status: String,

    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: u64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    /// 동기화기가 살아 있는 심볼 수
    pub active_symbol_count: usize,

    pub active_symbols: Vec<String>,

    /// 접속 중인 `/ws/tickers` 세션 수
    pub ticker_sessions: usize,
}

/// 헬스 체크.
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active_symbols: Vec<String> = state
        .registry
        .active_symbols()
        .iter()
        .map(|s| s.to_string())
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        active_symbol_count: active_symbols.len(),
        active_symbols,
        ticker_sessions: state.tickers.session_count(),
    })
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use market_core::Symbol;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_active_symbols() {
        let (state, _transport) = create_test_state("http://127.0.0.1:9");
        let state = Arc::new(state);
        let _handle = state.registry.acquire(Symbol::parse("BTCUSDT").unwrap());

        let app = Router::new()
            .nest("/health", health_router())
            .with_state(state.clone());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_symbol_count, 1);
        assert_eq!(health.active_symbols, vec!["BTCUSDT"]);
        assert_eq!(health.ticker_sessions, 0);
        assert!(!health.version.is_empty());
    }
}
