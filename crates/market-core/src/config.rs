//! 설정 관리.
//!
//! 기본값 → TOML 파일(선택) → 환경 변수(`MARKET__SECTION__KEY`) 순서로 덮어씁니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::Interval;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 거래소 연결 설정
    pub exchange: ExchangeConfig,
    /// 실시간 스트림 설정
    pub stream: StreamConfig,
    /// 심볼 목록 프록시 설정
    pub symbols: SymbolsConfig,
    /// 전체 시장 티커 스트림 설정
    pub tickers: TickersConfig,
    /// 캔들 프록시 설정
    pub candles: CandlesConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// 거래소 연결 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// REST API 기본 URL
    pub rest_base_url: String,
    /// WebSocket 기본 URL (`/ws`, `/stream` 경로는 붙이지 않음)
    pub ws_base_url: String,
    /// REST 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://api.binance.com".to_string(),
            ws_base_url: "wss://stream.binance.com:9443".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl ExchangeConfig {
    /// REST 요청 타임아웃.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 심볼별 실시간 스트림 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 호가 스냅샷/부분 호가 스트림 깊이 (5, 10, 20 중 하나)
    pub depth_limit: u32,
    /// 최근 체결 테이프 최대 길이
    pub trade_history: usize,
    /// 진행 중 캔들 스트림 간격
    pub kline_interval: String,
    /// 재연결 기본 대기 시간 (밀리초)
    pub reconnect_base_ms: u64,
    /// 재연결 최대 대기 시간 (밀리초)
    pub reconnect_max_ms: u64,
    /// 재연결 최대 시도 횟수
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            depth_limit: crate::DEFAULT_DEPTH_LIMIT,
            trade_history: crate::MAX_RECENT_TRADES,
            kline_interval: "1m".to_string(),
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl StreamConfig {
    /// 캔들 스트림 간격. 알 수 없는 값이면 1분봉.
    pub fn kline_interval(&self) -> Interval {
        Interval::parse_request(&self.kline_interval).unwrap_or(Interval::M1)
    }

    /// 재연결 기본 대기 시간.
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    /// 재연결 최대 대기 시간.
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

/// 심볼 목록 프록시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SymbolsConfig {
    /// 캐시 TTL (초)
    pub cache_ttl_secs: u64,
    /// 허용 호가 자산 목록
    pub quote_assets: Vec<String>,
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60 * 60,
            quote_assets: ["USDT", "BTC", "ETH", "BNB"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SymbolsConfig {
    /// 캐시 TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// 전체 시장 티커 스트림 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TickersConfig {
    /// 공유 티커 스트림이 유지할 심볼 집합
    pub watchlist: Vec<String>,
}

impl Default for TickersConfig {
    fn default() -> Self {
        Self {
            watchlist: [
                "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT",
                "AVAXUSDT", "DOTUSDT", "LINKUSDT",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// 캔들 프록시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CandlesConfig {
    /// `limit` 미지정 시 기본값
    pub default_limit: u32,
    /// 거래소가 허용하는 최대 `limit`
    pub max_limit: u32,
}

impl Default for CandlesConfig {
    fn default() -> Self {
        Self {
            default_limit: 500,
            max_limit: 1000,
        }
    }
}

impl CandlesConfig {
    /// 요청된 limit을 1..=max_limit 범위로 보정합니다.
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("MARKET")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tickers.watchlist")
                    .with_list_parse_key("symbols.quote_assets")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.exchange.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.stream.depth_limit, 20);
        assert_eq!(config.stream.trade_history, 50);
        assert_eq!(config.stream.max_reconnect_attempts, 5);
        assert_eq!(config.stream.kline_interval(), Interval::M1);
        assert_eq!(config.symbols.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.symbols.quote_assets, vec!["USDT", "BTC", "ETH", "BNB"]);
    }

    #[test]
    fn test_clamp_limit() {
        let candles = CandlesConfig::default();
        assert_eq!(candles.clamp_limit(None), 500);
        assert_eq!(candles.clamp_limit(Some(0)), 1);
        assert_eq!(candles.clamp_limit(Some(5000)), 1000);
        assert_eq!(candles.clamp_limit(Some(42)), 42);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.candles.max_limit, 1000);
    }
}
