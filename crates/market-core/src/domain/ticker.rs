//! 전체 시장 미니 티커.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 전체 시장 브로드캐스트의 심볼별 미니 티커.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniTicker {
    pub symbol: String,
    pub close: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub base_volume: String,
    pub quote_volume: String,
}

/// 심볼 → 최신 미니 티커.
pub type TickerMap = BTreeMap<String, MiniTicker>;

/// 브로드캐스트 배치를 구독 심볼 집합으로 걸러 맵에 반영합니다.
///
/// 값이 실제로 바뀐 항목이 하나라도 있을 때만 새 맵을 반환합니다.
pub fn merge_tickers(
    map: &TickerMap,
    batch: &[MiniTicker],
    symbols: &HashSet<String>,
) -> Option<TickerMap> {
    let mut next: Option<TickerMap> = None;

    for ticker in batch.iter().filter(|t| symbols.contains(&t.symbol)) {
        let current = next.as_ref().unwrap_or(map);
        if current.get(&ticker.symbol) == Some(ticker) {
            continue;
        }
        next.get_or_insert_with(|| map.clone())
            .insert(ticker.symbol.clone(), ticker.clone());
    }

    next
}

/// 심볼 집합 밖의 키를 제거합니다. 제거된 항목이 없으면 `None`.
pub fn retain_tickers(map: &TickerMap, symbols: &HashSet<String>) -> Option<TickerMap> {
    if map.keys().all(|k| symbols.contains(k)) {
        return None;
    }
    Some(
        map.iter()
            .filter(|(k, _)| symbols.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}
