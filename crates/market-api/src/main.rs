//! 시세 프록시 서버.
//!
//! REST 프록시(`/candles`, `/symbols`)와 실시간 WebSocket 피드를 시작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use market_api::routes::create_api_router;
use market_api::state::AppState;
use market_core::{init_logging, AppConfig, LogConfig};
use market_exchange::TungsteniteTransport;

/// CORS 레이어. 브라우저 소비자를 위해 모든 origin의 GET을 허용합니다.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// 라우터 생성 및 미들웨어 설정.
fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 상류 타임아웃보다 길게
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (없으면 무시)
    dotenvy::dotenv().ok();

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from_settings(&config.logging))?;

    info!("Starting market proxy server...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. MARKET__SERVER__HOST, MARKET__SERVER__PORT를 확인하세요."
            );
            e
        })?;

    let state = Arc::new(AppState::new(config, Arc::new(TungsteniteTransport))?);
    info!(
        version = %state.version,
        rest = %state.config.exchange.rest_base_url,
        ws = %state.config.exchange.ws_base_url,
        watchlist = state.config.tickers.watchlist.len(),
        "Application state initialized"
    );

    let app = create_router(state.clone());

    info!(%addr, "API server listening");
    info!("WebSocket available at ws://{}/ws/market and ws://{}/ws/tickers", addr, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    state.shutdown();

    // 상류 소켓 태스크가 닫힐 시간을 잠깐 줌
    let cleanup = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
    })
    .await;
    if cleanup.is_err() {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
/// 토큰이 취소되면 열린 WebSocket 세션이 루프를 빠져나옵니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to WebSocket sessions");
}
