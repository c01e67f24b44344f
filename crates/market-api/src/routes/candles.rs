//! 과거 캔들 프록시.
//!
//! # 엔드포인트
//!
//! - `GET /candles?symbol=<SYM>&interval=<IV>&limit=<N>`
//!
//! `interval`은 축약형(`1`, `15`, `60`, `240`, `D`, `W`, `M`)과 이름형(`1m`, `4h`, `1d`, `1M`)을
//! 모두 받으며 거래소 간격 어휘로 바꿔 전달합니다.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use market_core::{CandleBar, Interval, Symbol};

use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;

/// 캔들 조회 파라미터.
#[derive(Debug, Default, Deserialize)]
pub struct CandlesQuery {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    /// 숫자가 아니면 기본값 사용
    pub limit: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 캔들 조회.
///
/// GET /candles
pub async fn get_candles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandlesQuery>,
) -> ProxyResult<Json<Vec<CandleBar>>> {
    let (Some(raw_symbol), Some(raw_interval)) =
        (non_empty(query.symbol), non_empty(query.interval))
    else {
        return Err(ProxyError::BadRequest(
            "Symbol and interval are required".to_string(),
        ));
    };

    let symbol = Symbol::parse(&raw_symbol).map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let interval = Interval::parse_request(&raw_interval)
        .ok_or_else(|| ProxyError::BadRequest(format!("Unsupported interval: {raw_interval}")))?;
    let limit = state
        .config
        .candles
        .clamp_limit(query.limit.and_then(|l| l.trim().parse().ok()));

    debug!(
        symbol = %symbol,
        interval = interval.to_binance_interval(),
        limit,
        span_secs = interval.duration().as_secs() * u64::from(limit),
        "캔들 프록시 요청"
    );

    let candles = state
        .binance
        .get_klines(&symbol, interval, limit)
        .await
        .map_err(|e| ProxyError::upstream(e, state.request_timeout()))?;

    Ok(Json(candles))
}

/// 캔들 라우터 생성.
pub fn candles_router() -> Router<Arc<AppState>> {
    Router::new().route("/candles", get(get_candles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorResponse;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use mockito::Matcher;
    use tower::ServiceExt;

    async fn call(base_url: &str, uri: &str) -> Response {
        let (state, _transport) = create_test_state(base_url);
        candles_router()
            .with_state(Arc::new(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    const KLINES: &str = r#"[
        [1700000000000,"50000.00","50100.00","49900.00","50050.00","12.5",1700000059999,"625000.0",100,"6.0","300000.0","0"],
        [1700000060000,"50050.00","50200.00","50000.00","50150.00","8.25",1700000119999,"413000.0",80,"4.0","200000.0","0"]
    ]"#;

    #[tokio::test]
    async fn test_candles_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "4h".into()),
                Matcher::UrlEncoded("limit".into(), "1000".into()),
            ]))
            .with_status(200)
            .with_body(KLINES)
            .create_async()
            .await;

        let response = call(&server.url(), "/candles?symbol=btcusdt&interval=240&limit=5000").await;
        assert_eq!(response.status(), StatusCode::OK);

        let candles: Vec<CandleBar> = body_json(response).await;
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_000);
        assert_eq!(candles[1].close, 50150.0);
        assert!(candles[0].time < candles[1].time);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_params() {
        let server = mockito::Server::new_async().await;

        for uri in ["/candles", "/candles?symbol=BTCUSDT", "/candles?interval=1m&symbol="] {
            let response = call(&server.url(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ApiErrorResponse = body_json(response).await;
            assert_eq!(body.error, "Symbol and interval are required");
        }
    }

    #[tokio::test]
    async fn test_unknown_interval() {
        let server = mockito::Server::new_async().await;
        let response = call(&server.url(), "/candles?symbol=BTCUSDT&interval=7x").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ApiErrorResponse = body_json(response).await;
        assert!(body.error.contains("7x"));
    }

    #[tokio::test]
    async fn test_upstream_error_forwarded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let response = call(&server.url(), "/candles?symbol=NOPEUSDT&interval=1m").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ApiErrorResponse = body_json(response).await;
        assert_eq!(body.error, "Invalid symbol.");
    }

    #[tokio::test]
    async fn test_upstream_non_json_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let response = call(&server.url(), "/candles?symbol=BTCUSDT&interval=1d").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ApiErrorResponse = body_json(response).await;
        assert_eq!(body.error, "Binance API request failed with status 503");
    }

    #[tokio::test]
    async fn test_default_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded("limit".into(), "500".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let response = call(&server.url(), "/candles?symbol=ETHUSDT&interval=1m&limit=abc").await;
        assert_eq!(response.status(), StatusCode::OK);
        mock.assert_async().await;
    }
}
