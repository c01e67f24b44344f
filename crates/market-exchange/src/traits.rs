//! 동기화 계층이 의존하는 거래소 인터페이스.

use async_trait::async_trait;
use market_core::{DepthSnapshot, Symbol, Ticker24h};

use crate::error::ExchangeResult;

/// 구독 시작/재연결 시 사용하는 REST 스냅샷 공급자.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// 24시간 통계를 조회합니다.
    async fn fetch_ticker_24h(&self, symbol: &Symbol) -> ExchangeResult<Ticker24h>;

    /// 상위 `limit` 단계 호가를 조회합니다.
    async fn fetch_depth(&self, symbol: &Symbol, limit: u32) -> ExchangeResult<DepthSnapshot>;
}
