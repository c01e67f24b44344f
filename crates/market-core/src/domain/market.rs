//! 심볼 단위 시장 뷰 모델.
//!
//! 뷰 모델은 갱신될 때마다 새 값으로 교체됩니다. 모든 `with_*` 메서드는
//! `&self`를 받아 새 인스턴스를 반환하며 원본은 건드리지 않습니다.
//! 가격과 수량은 거래소가 보낸 문자열 그대로 보관하고, 숫자 변환은
//! 표시 경계(`best_bid`, `spread` 등)에서만 수행합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// 최근 체결 테이프 최대 길이.
pub const MAX_RECENT_TRADES: usize = 50;

/// 호가 스냅샷/부분 호가 스트림의 기본 깊이.
pub const DEFAULT_DEPTH_LIMIT: u32 = 20;

/// 호가 한 단계 (가격, 수량).
///
/// 거래소 표현과 같이 `["price", "qty"]` 배열로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DepthLevel {
    pub price: String,
    pub quantity: String,
}

impl DepthLevel {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }

    /// 가격을 Decimal로 파싱합니다.
    pub fn price_decimal(&self) -> Option<Decimal> {
        self.price.parse().ok()
    }
}

impl From<(String, String)> for DepthLevel {
    fn from((price, quantity): (String, String)) -> Self {
        Self { price, quantity }
    }
}

impl From<DepthLevel> for (String, String) {
    fn from(level: DepthLevel) -> Self {
        (level.price, level.quantity)
    }
}

/// REST 24시간 통계 스냅샷.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub last_price: String,
    pub price_change_percent: String,
    pub volume: String,
    pub quote_volume: String,
    pub high_price: String,
    pub low_price: String,
}

/// REST 호가 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// 24시간 티커 푸시.
///
/// 메시지에 없는 필드는 `None`이며 기존 값을 덮어쓰지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerUpdate {
    pub last_price: Option<String>,
    pub price_change_percent: Option<String>,
    pub volume: Option<String>,
    pub quote_volume: Option<String>,
    pub high_price: Option<String>,
    pub low_price: Option<String>,
}

/// 체결 기록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// 거래소 체결 ID
    pub id: u64,
    pub price: String,
    pub quantity: String,
    /// 체결 시각 (epoch ms)
    pub timestamp: i64,
    pub is_buyer_maker: bool,
}

/// 진행 중인 캔들.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineBar {
    /// 캔들 시작 시각 (epoch ms)
    pub start_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

/// 심볼 하나에 대한 시장 뷰 모델.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketViewModel {
    pub symbol: Symbol,
    pub last_price: String,
    pub price_change_percent: String,
    pub volume: String,
    pub quote_volume: String,
    pub high_price: String,
    pub low_price: String,
    /// 매수 호가 (좋은 가격부터)
    pub bids: Vec<DepthLevel>,
    /// 매도 호가 (좋은 가격부터)
    pub asks: Vec<DepthLevel>,
    /// 최근 체결 (최신순, ID 중복 없음)
    pub recent_trades: Vec<TradeRecord>,
    pub latest_trade: Option<TradeRecord>,
    pub kline: Option<KlineBar>,
}

impl MarketViewModel {
    /// REST 스냅샷으로 초기 모델을 만듭니다. 체결과 캔들은 비어 있습니다.
    pub fn from_snapshot(symbol: Symbol, ticker: Ticker24h, depth: DepthSnapshot) -> Self {
        Self {
            symbol,
            last_price: ticker.last_price,
            price_change_percent: ticker.price_change_percent,
            volume: ticker.volume,
            quote_volume: ticker.quote_volume,
            high_price: ticker.high_price,
            low_price: ticker.low_price,
            bids: depth.bids,
            asks: depth.asks,
            recent_trades: Vec::new(),
            latest_trade: None,
            kline: None,
        }
    }

    /// 티커 푸시를 반영한 새 모델.
    pub fn with_ticker(&self, update: &TickerUpdate) -> Self {
        fn pick(new: &Option<String>, old: &str) -> String {
            new.clone().unwrap_or_else(|| old.to_string())
        }

        Self {
            last_price: pick(&update.last_price, &self.last_price),
            price_change_percent: pick(&update.price_change_percent, &self.price_change_percent),
            volume: pick(&update.volume, &self.volume),
            quote_volume: pick(&update.quote_volume, &self.quote_volume),
            high_price: pick(&update.high_price, &self.high_price),
            low_price: pick(&update.low_price, &self.low_price),
            ..self.clone()
        }
    }

    /// 부분 호가 푸시를 반영한 새 모델.
    ///
    /// 메시지에 있는 쪽은 통째로 교체하고, 없는 쪽은 유지합니다.
    /// 이전 단계와 병합하지 않습니다.
    pub fn with_depth(&self, bids: Option<Vec<DepthLevel>>, asks: Option<Vec<DepthLevel>>) -> Self {
        Self {
            bids: bids.unwrap_or_else(|| self.bids.clone()),
            asks: asks.unwrap_or_else(|| self.asks.clone()),
            ..self.clone()
        }
    }

    /// 체결을 테이프 맨 앞에 추가한 새 모델.
    ///
    /// 같은 ID가 이미 있으면 `None`을 반환합니다 (먼저 받은 기록 유지).
    /// 테이프는 `cap` 길이로 잘립니다.
    pub fn with_trade(&self, trade: TradeRecord, cap: usize) -> Option<Self> {
        if self.contains_trade(trade.id) {
            return None;
        }

        let mut recent_trades = Vec::with_capacity(cap.min(self.recent_trades.len() + 1));
        recent_trades.push(trade.clone());
        recent_trades.extend(
            self.recent_trades
                .iter()
                .take(cap.saturating_sub(1))
                .cloned(),
        );
        recent_trades.truncate(cap);

        Some(Self {
            recent_trades,
            latest_trade: Some(trade),
            ..self.clone()
        })
    }

    /// 캔들 푸시로 진행 중 캔들을 통째로 덮어쓴 새 모델.
    pub fn with_kline(&self, bar: KlineBar) -> Self {
        Self {
            kline: Some(bar),
            ..self.clone()
        }
    }

    /// 테이프에 해당 체결 ID가 있는지 확인합니다.
    pub fn contains_trade(&self, id: u64) -> bool {
        self.recent_trades.iter().any(|t| t.id == id)
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().and_then(DepthLevel::price_decimal)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().and_then(DepthLevel::price_decimal)
    }

    /// 매도 최우선가 - 매수 최우선가.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn snapshot() -> MarketViewModel {
        MarketViewModel::from_snapshot(
            Symbol::parse("BTCUSDT").unwrap(),
            Ticker24h {
                last_price: "50000.00".to_string(),
                price_change_percent: "1.25".to_string(),
                volume: "1234.5".to_string(),
                quote_volume: "61725000.0".to_string(),
                high_price: "51000.00".to_string(),
                low_price: "49000.00".to_string(),
            },
            DepthSnapshot {
                bids: vec![DepthLevel::new("49999.00", "1.0")],
                asks: vec![DepthLevel::new("50001.00", "2.0")],
            },
        )
    }

    fn trade(id: u64, price: &str) -> TradeRecord {
        TradeRecord {
            id,
            price: price.to_string(),
            quantity: "0.1".to_string(),
            timestamp: 1_700_000_000_000 + id as i64,
            is_buyer_maker: id % 2 == 0,
        }
    }

    #[test]
    fn test_snapshot_starts_without_trades() {
        let model = snapshot();
        assert!(model.recent_trades.is_empty());
        assert!(model.latest_trade.is_none());
        assert!(model.kline.is_none());
    }

    #[test]
    fn test_ticker_keeps_absent_fields() {
        let model = snapshot();
        let updated = model.with_ticker(&TickerUpdate {
            last_price: Some("50050.00".to_string()),
            ..Default::default()
        });

        assert_eq!(updated.last_price, "50050.00");
        assert_eq!(updated.high_price, "51000.00");
        assert_eq!(updated.low_price, "49000.00");
        // 원본은 그대로
        assert_eq!(model.last_price, "50000.00");
    }

    #[test]
    fn test_depth_replaces_side() {
        let model = snapshot()
            .with_depth(
                Some(vec![DepthLevel::new("100", "1"), DepthLevel::new("99", "1")]),
                Some(vec![DepthLevel::new("101", "1")]),
            )
            .with_depth(
                Some(vec![DepthLevel::new("90", "5")]),
                Some(vec![DepthLevel::new("95", "3"), DepthLevel::new("96", "3")]),
            );

        assert_eq!(model.bids, vec![DepthLevel::new("90", "5")]);
        assert_eq!(
            model.asks,
            vec![DepthLevel::new("95", "3"), DepthLevel::new("96", "3")]
        );
    }

    #[test]
    fn test_depth_missing_side_kept() {
        let model = snapshot().with_depth(None, Some(vec![DepthLevel::new("60000", "1")]));
        assert_eq!(model.bids, vec![DepthLevel::new("49999.00", "1.0")]);
        assert_eq!(model.asks, vec![DepthLevel::new("60000", "1")]);
    }

    #[test]
    fn test_duplicate_trade_keeps_first() {
        let model = snapshot().with_trade(trade(7, "100.0"), MAX_RECENT_TRADES).unwrap();
        assert!(model.with_trade(trade(7, "200.0"), MAX_RECENT_TRADES).is_none());
        assert_eq!(model.recent_trades[0].id, 7);
        assert_eq!(model.recent_trades[0].price, "100.0");
        assert_eq!(model.latest_trade.as_ref().map(|t| t.id), Some(7));
    }

    #[test]
    fn test_trades_newest_first() {
        let model = snapshot()
            .with_trade(trade(1, "1"), 3)
            .and_then(|m| m.with_trade(trade(2, "2"), 3))
            .and_then(|m| m.with_trade(trade(3, "3"), 3))
            .and_then(|m| m.with_trade(trade(4, "4"), 3))
            .unwrap();
        let ids: Vec<u64> = model.recent_trades.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[test]
    fn test_kline_overwritten() {
        let bar = |close: &str| KlineBar {
            start_time: 1_700_000_000_000,
            open: "1".to_string(),
            high: "3".to_string(),
            low: "1".to_string(),
            close: close.to_string(),
            volume: "10".to_string(),
        };
        let model = snapshot().with_kline(bar("2")).with_kline(bar("2.5"));
        assert_eq!(model.kline.unwrap().close, "2.5");
    }

    #[test]
    fn test_spread() {
        let model = snapshot();
        assert_eq!(model.best_bid(), Some(dec!(49999.00)));
        assert_eq!(model.best_ask(), Some(dec!(50001.00)));
        assert_eq!(model.spread(), Some(dec!(2.00)));

        let empty = model.with_depth(Some(vec![]), None);
        assert_eq!(empty.spread(), None);
    }

    #[test]
    fn test_depth_level_serializes_as_pair() {
        let json = serde_json::to_string(&DepthLevel::new("1.5", "2")).unwrap();
        assert_eq!(json, r#"["1.5","2"]"#);
        let level: DepthLevel = serde_json::from_str(r#"["3","4"]"#).unwrap();
        assert_eq!(level, DepthLevel::new("3", "4"));
    }

    proptest! {
        #[test]
        fn prop_trade_ids_unique_and_capped(ids in prop::collection::vec(0u64..80, 0..300)) {
            let mut model = snapshot();
            let mut first_seen: Vec<u64> = Vec::new();
            for id in &ids {
                if let Some(next) = model.with_trade(trade(*id, &id.to_string()), MAX_RECENT_TRADES) {
                    model = next;
                    first_seen.push(*id);
                }
            }

            let unique: HashSet<u64> = model.recent_trades.iter().map(|t| t.id).collect();
            prop_assert_eq!(unique.len(), model.recent_trades.len());
            prop_assert!(model.recent_trades.len() <= MAX_RECENT_TRADES);

            // 테이프는 받아들인 순서의 역순 꼬리와 같아야 함
            let expected: Vec<u64> = first_seen.iter().rev().take(MAX_RECENT_TRADES).copied().collect();
            let actual: Vec<u64> = model.recent_trades.iter().map(|t| t.id).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
