//! Binance 공개 REST API 클라이언트.
//!
//! 인증이 필요 없는 시세 엔드포인트만 사용합니다:
//! - `/api/v3/ticker/24hr` - 24시간 통계
//! - `/api/v3/depth` - 호가 스냅샷
//! - `/api/v3/klines` - 과거 캔들
//! - `/api/v3/exchangeInfo` - 거래 가능 심볼

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use market_core::{CandleBar, DepthSnapshot, ExchangeConfig, Interval, Symbol, Ticker24h};

use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::SnapshotSource;

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct BinanceError {
    #[allow(dead_code)]
    code: Option<i64>,
    msg: Option<String>,
}

/// `/api/v3/klines` 행.
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,       // 0: Open time
    String,    // 1: Open
    String,    // 2: High
    String,    // 3: Low
    String,    // 4: Close
    String,    // 5: Volume
    IgnoredAny, // 6: Close time
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

/// `/api/v3/exchangeInfo` 응답 중 필요한 부분.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// 거래소 심볼 메타데이터.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
}

impl ExchangeInfo {
    /// 거래 중(`TRADING`)이고 허용된 호가 자산으로 거래되는 심볼을 알파벳순으로 반환합니다.
    pub fn tradable_symbols<S: AsRef<str>>(&self, quote_assets: &[S]) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .symbols
            .iter()
            .filter(|s| s.status == "TRADING")
            .filter(|s| quote_assets.iter().any(|q| q.as_ref() == s.quote_asset))
            .map(|s| s.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 공개 REST 클라이언트.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// 설정으로 클라이언트를 생성합니다. 모든 요청에 설정된 타임아웃이 적용됩니다.
    pub fn new(config: &ExchangeConfig) -> ExchangeResult<Self> {
        Self::with_base_url(&config.rest_base_url, config.request_timeout())
    }

    /// 기본 URL을 지정해 생성합니다 (테스트 서버 등).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 공개 API GET 요청.
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, ?params, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        Self::handle_response(response).await
    }

    /// 응답 상태에 따라 본문을 역직렬화하거나 에러로 변환합니다.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                warn!(error = %e, "응답 파싱 실패");
                ExchangeError::Parse(e.to_string())
            });
        }

        let message = serde_json::from_str::<BinanceError>(&body)
            .ok()
            .and_then(|e| e.msg)
            .unwrap_or_else(|| format!("Binance API request failed with status {}", status.as_u16()));

        // 418(IP 차단)을 포함한 나머지 상태는 그대로 전달
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited(message));
        }

        Err(ExchangeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// 24시간 통계.
    pub async fn get_ticker_24h(&self, symbol: &Symbol) -> ExchangeResult<Ticker24h> {
        self.public_get("/api/v3/ticker/24hr", &[("symbol", symbol.to_string())])
            .await
    }

    /// 호가 스냅샷.
    pub async fn get_depth(&self, symbol: &Symbol, limit: u32) -> ExchangeResult<DepthSnapshot> {
        self.public_get(
            "/api/v3/depth",
            &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// 과거 캔들. 시간 오름차순입니다.
    pub async fn get_klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        limit: u32,
    ) -> ExchangeResult<Vec<CandleBar>> {
        let rows: Vec<BinanceKline> = self
            .public_get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_binance_interval().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.into_iter()
            .map(|k| {
                CandleBar::from_parts(k.0, &k.1, &k.2, &k.3, &k.4, &k.5)
                    .map_err(|e| ExchangeError::Parse(e.to_string()))
            })
            .collect()
    }

    /// 거래소 심볼 메타데이터.
    pub async fn get_exchange_info(&self) -> ExchangeResult<ExchangeInfo> {
        self.public_get("/api/v3/exchangeInfo", &[]).await
    }
}

#[async_trait]
impl SnapshotSource for BinanceClient {
    async fn fetch_ticker_24h(&self, symbol: &Symbol) -> ExchangeResult<Ticker24h> {
        self.get_ticker_24h(symbol).await
    }

    async fn fetch_depth(&self, symbol: &Symbol, limit: u32) -> ExchangeResult<DepthSnapshot> {
        self.get_depth(symbol, limit).await
    }
}
