//! 거래 가능 심볼 프록시.
//!
//! - `GET /symbols` - 허용 견적 자산으로 거래 중인 심볼 (알파벳순)

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;
use tracing::debug;

use market_exchange::ExchangeError;

use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;

fn describe(err: &ExchangeError) -> String {
    match err {
        ExchangeError::Api { status, .. } => {
            format!("Failed to fetch from Binance. Status: {status}")
        }
        other => other.to_string(),
    }
}

/// 심볼 목록 조회.
///
/// GET /symbols
pub async fn get_symbols(State(state): State<Arc<AppState>>) -> ProxyResult<Json<Vec<String>>> {
    let lookup = state
        .symbols
        .get()
        .await
        .map_err(|e| ProxyError::Internal(format!("Internal Server Error: {}", describe(&e))))?;

    debug!(count = lookup.symbols.len(), status = ?lookup.status, "심볼 목록 응답");
    Ok(Json(lookup.symbols.as_ref().clone()))
}

/// 심볼 라우터 생성.
pub fn symbols_router() -> Router<Arc<AppState>> {
    Router::new().route("/symbols", get(get_symbols))
}
