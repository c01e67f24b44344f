//! 동기화 계층 설정과 의존성 묶음.

use std::sync::Arc;

use market_core::{AppConfig, Interval};
use market_exchange::{BackoffPolicy, SnapshotSource, Transport};

/// 스트림 URL과 병합 규칙 설정.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub ws_base_url: String,
    pub depth_limit: u32,
    pub trade_history: usize,
    pub kline_interval: Interval,
    pub backoff: BackoffPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ws_base_url: config.exchange.ws_base_url.clone(),
            depth_limit: config.stream.depth_limit,
            trade_history: config.stream.trade_history,
            kline_interval: config.stream.kline_interval(),
            backoff: BackoffPolicy::from_config(&config.stream),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// 동기화기를 만들 때 필요한 공유 의존성.
#[derive(Clone)]
pub struct SyncDeps {
    pub source: Arc<dyn SnapshotSource>,
    pub transport: Arc<dyn Transport>,
    pub settings: SyncSettings,
}

impl SyncDeps {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        transport: Arc<dyn Transport>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            transport,
            settings,
        }
    }
}
