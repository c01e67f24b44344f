//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! Arc로 래핑되어 여러 요청과 WebSocket 세션 간에 공유됩니다.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use market_core::{AppConfig, Symbol};
use market_exchange::{BinanceClient, ExchangeResult, Transport};
use market_sync::{SubscriptionRegistry, SyncDeps, SyncSettings, TickerStream};

use crate::cache::{SymbolCache, SymbolSource};
use crate::websocket::TickerHub;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    /// 거래소 REST 클라이언트 (캔들 프록시, 스냅샷)
    pub binance: Arc<BinanceClient>,

    /// 거래 가능 심볼 캐시
    pub symbols: Arc<SymbolCache>,

    /// 심볼 피드 공유 레지스트리 - `/ws/market` 세션이 사용
    pub registry: SubscriptionRegistry,

    /// 상류 티커 스트림 허브 - `/ws/tickers` 세션이 사용
    pub tickers: Arc<TickerHub>,

    /// 종료 토큰. 취소되면 WebSocket 세션이 닫힙니다.
    pub shutdown: CancellationToken,

    pub version: String,

    started_at: Instant,
}

/// 설정의 관심 목록을 심볼로 변환합니다. 잘못된 항목은 건너뜁니다.
fn parse_watchlist(raw: &[String]) -> Vec<Symbol> {
    raw.iter()
        .filter_map(|s| match Symbol::parse(s) {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                warn!(symbol = %s, error = %e, "관심 목록 항목 무시");
                None
            }
        })
        .collect()
}

impl AppState {
    /// 설정으로 상태를 만듭니다. 소켓 연결은 주어진 전송 계층을 사용합니다.
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>) -> ExchangeResult<Self> {
        let binance = Arc::new(BinanceClient::new(&config.exchange)?);
        Ok(Self::with_parts(config, binance.clone(), binance, transport))
    }

    /// 심볼 공급자를 따로 지정해 상태를 만듭니다.
    pub fn with_parts(
        config: AppConfig,
        binance: Arc<BinanceClient>,
        symbol_source: Arc<dyn SymbolSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let settings = SyncSettings::from_config(&config);
        let registry = SubscriptionRegistry::new(SyncDeps::new(
            binance.clone(),
            transport.clone(),
            settings.clone(),
        ));
        let tickers = TickerHub::new(
            TickerStream::new(transport, settings),
            parse_watchlist(&config.tickers.watchlist),
        );
        let symbols = SymbolCache::from_config(symbol_source, &config.symbols);

        Self {
            config: Arc::new(config),
            binance,
            symbols: Arc::new(symbols),
            registry,
            tickers: Arc::new(tickers),
            shutdown: CancellationToken::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.exchange.request_timeout()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// 모든 세션과 상류 소켓을 닫습니다.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.registry.shutdown();
        self.tickers.shutdown();
        info!("애플리케이션 상태 정리 완료");
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state(rest_base_url: &str) -> (AppState, market_exchange::testing::ScriptedTransport) {
    let mut config = AppConfig::default();
    config.exchange.rest_base_url = rest_base_url.to_string();
    let transport = market_exchange::testing::ScriptedTransport::new();
    let state = AppState::new(config, Arc::new(transport.clone()))
        .expect("test client");
    (state, transport)
}
