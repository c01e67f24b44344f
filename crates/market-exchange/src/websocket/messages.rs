//! Binance 푸시 프로토콜 메시지.
//!
//! 결합 스트림(`/stream?streams=a/b/c`)은 모든 메시지를 `{stream, data}` 봉투로 감싸므로
//! 스트림 이름 접미사로 페이로드 종류를 판별합니다. 전체 시장 미니 티커
//! (`/ws/!miniTicker@arr`)는 봉투 없이 배열을 그대로 보냅니다.

use serde::Deserialize;

use market_core::{DepthLevel, Interval, KlineBar, MiniTicker, Symbol, TickerUpdate, TradeRecord};

use crate::error::{ExchangeError, ExchangeResult};

// ============================================================================
// 스트림 이름/URL
// ============================================================================

/// 결합 스트림 URL.
pub fn combined_stream_url(ws_base: &str, streams: &[String]) -> String {
    format!(
        "{}/stream?streams={}",
        ws_base.trim_end_matches('/'),
        streams.join("/")
    )
}

/// 전체 시장 미니 티커 스트림 URL.
pub fn mini_ticker_url(ws_base: &str) -> String {
    format!("{}/ws/!miniTicker@arr", ws_base.trim_end_matches('/'))
}

/// 심볼 하나의 시장 스트림 목록 (티커, 부분 호가, 체결, 캔들).
pub fn market_streams(symbol: &Symbol, depth_limit: u32, kline: Interval) -> Vec<String> {
    let s = symbol.stream_name();
    vec![
        format!("{s}@ticker"),
        format!("{s}@depth{depth_limit}@100ms"),
        format!("{s}@trade"),
        format!("{s}@kline_{}", kline.to_binance_interval()),
    ]
}

// ============================================================================
// 봉투와 스트림 분류
// ============================================================================

/// 결합 스트림 봉투.
#[derive(Debug, Deserialize)]
pub struct StreamEnvelope {
    pub stream: String,
    pub data: serde_json::Value,
}

/// 스트림 이름으로 판별한 페이로드 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Ticker,
    Depth,
    Trade,
    Kline,
    Unknown,
}

impl StreamKind {
    pub fn classify(stream: &str) -> Self {
        let Some((_, suffix)) = stream.split_once('@') else {
            return StreamKind::Unknown;
        };

        if suffix == "ticker" {
            StreamKind::Ticker
        } else if suffix == "trade" {
            StreamKind::Trade
        } else if suffix.starts_with("depth") {
            StreamKind::Depth
        } else if suffix.starts_with("kline_") {
            StreamKind::Kline
        } else {
            StreamKind::Unknown
        }
    }
}

// ============================================================================
// 페이로드
// ============================================================================

/// `<symbol>@ticker` 페이로드. 누락 필드는 `None`.
#[derive(Debug, Deserialize)]
pub struct WsTicker {
    #[serde(rename = "c")]
    pub last_price: Option<String>,
    #[serde(rename = "P")]
    pub price_change_percent: Option<String>,
    #[serde(rename = "v")]
    pub volume: Option<String>,
    #[serde(rename = "q")]
    pub quote_volume: Option<String>,
    #[serde(rename = "h")]
    pub high_price: Option<String>,
    #[serde(rename = "l")]
    pub low_price: Option<String>,
}

impl From<WsTicker> for TickerUpdate {
    fn from(t: WsTicker) -> Self {
        TickerUpdate {
            last_price: t.last_price,
            price_change_percent: t.price_change_percent,
            volume: t.volume,
            quote_volume: t.quote_volume,
            high_price: t.high_price,
            low_price: t.low_price,
        }
    }
}

/// `<symbol>@depth<N>@100ms` 부분 호가 페이로드.
#[derive(Debug, Deserialize)]
pub struct WsPartialDepth {
    pub bids: Option<Vec<DepthLevel>>,
    pub asks: Option<Vec<DepthLevel>>,
}

/// `<symbol>@trade` 페이로드.
#[derive(Debug, Deserialize)]
pub struct WsTrade {
    #[serde(rename = "t")]
    pub trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "T")]
    pub timestamp: i64,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

impl From<WsTrade> for TradeRecord {
    fn from(t: WsTrade) -> Self {
        TradeRecord {
            id: t.trade_id,
            price: t.price,
            quantity: t.quantity,
            timestamp: t.timestamp,
            is_buyer_maker: t.is_buyer_maker,
        }
    }
}

/// `<symbol>@kline_<iv>` 페이로드.
#[derive(Debug, Deserialize)]
pub struct WsKlineEvent {
    #[serde(rename = "k")]
    pub kline: WsKline,
}

#[derive(Debug, Deserialize)]
pub struct WsKline {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
}

impl From<WsKline> for KlineBar {
    fn from(k: WsKline) -> Self {
        KlineBar {
            start_time: k.open_time,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
        }
    }
}

/// `!miniTicker@arr` 원소.
#[derive(Debug, Deserialize)]
pub struct WsMiniTicker {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub base_volume: String,
    #[serde(rename = "q")]
    pub quote_volume: String,
}

impl From<WsMiniTicker> for MiniTicker {
    fn from(t: WsMiniTicker) -> Self {
        MiniTicker {
            symbol: t.symbol,
            close: t.close,
            open: t.open,
            high: t.high,
            low: t.low,
            base_volume: t.base_volume,
            quote_volume: t.quote_volume,
        }
    }
}

// ============================================================================
// 파싱
// ============================================================================

/// 뷰 모델에 반영할 심볼 스트림 이벤트.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketPush {
    Ticker(TickerUpdate),
    Depth {
        bids: Option<Vec<DepthLevel>>,
        asks: Option<Vec<DepthLevel>>,
    },
    Trade(TradeRecord),
    Kline(KlineBar),
}

impl MarketPush {
    /// 결합 스트림 텍스트 프레임을 파싱합니다.
    ///
    /// 봉투 형식이 아니거나, 알 수 없는 스트림이거나, 페이로드가 기대한 모양이 아니면
    /// `ExchangeError::Parse`를 반환합니다.
    pub fn parse(text: &str) -> ExchangeResult<Self> {
        let envelope: StreamEnvelope = serde_json::from_str(text)?;

        let push = match StreamKind::classify(&envelope.stream) {
            StreamKind::Ticker => {
                let t: WsTicker = serde_json::from_value(envelope.data)?;
                MarketPush::Ticker(t.into())
            }
            StreamKind::Depth => {
                let d: WsPartialDepth = serde_json::from_value(envelope.data)?;
                MarketPush::Depth {
                    bids: d.bids,
                    asks: d.asks,
                }
            }
            StreamKind::Trade => {
                let t: WsTrade = serde_json::from_value(envelope.data)?;
                MarketPush::Trade(t.into())
            }
            StreamKind::Kline => {
                let k: WsKlineEvent = serde_json::from_value(envelope.data)?;
                MarketPush::Kline(k.kline.into())
            }
            StreamKind::Unknown => {
                return Err(ExchangeError::Parse(format!(
                    "알 수 없는 스트림: {}",
                    envelope.stream
                )))
            }
        };

        Ok(push)
    }
}

/// 전체 시장 미니 티커 배열을 파싱합니다.
pub fn parse_mini_ticker_batch(text: &str) -> ExchangeResult<Vec<MiniTicker>> {
    let batch: Vec<WsMiniTicker> = serde_json::from_str(text)?;
    Ok(batch.into_iter().map(MiniTicker::from).collect())
}
