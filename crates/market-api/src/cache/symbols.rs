//! 거래 가능 심볼 목록 캐시.
//!
//! 수명: 비어 있는 상태로 시작해 TTL이 지나면 다음 요청에서 갱신되고, 프로세스가
//! 끝날 때까지 유지됩니다. 갱신에 실패하면 마지막으로 받은 목록을 그대로 돌려줍니다.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use market_core::SymbolsConfig;
use market_exchange::{BinanceClient, ExchangeResult};

/// 거래 가능 심볼 공급자.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// 허용 견적 자산으로 거래 중인 심볼 (알파벳순).
    async fn fetch_tradable_symbols(&self, quote_assets: &[String]) -> ExchangeResult<Vec<String>>;
}

#[async_trait]
impl SymbolSource for BinanceClient {
    async fn fetch_tradable_symbols(&self, quote_assets: &[String]) -> ExchangeResult<Vec<String>> {
        let info = self.get_exchange_info().await?;
        Ok(info.tradable_symbols(quote_assets))
    }
}

/// 응답이 어디서 왔는지.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// TTL 안의 캐시
    Fresh,
    /// 방금 거래소에서 갱신
    Refreshed,
    /// 갱신 실패로 만료된 캐시를 사용
    Stale,
}

/// 조회 결과.
#[derive(Debug, Clone)]
pub struct SymbolLookup {
    pub symbols: Arc<Vec<String>>,
    pub status: CacheStatus,
}

struct CacheEntry {
    symbols: Arc<Vec<String>>,
    fetched_at: Instant,
}

/// TTL 심볼 캐시.
pub struct SymbolCache {
    source: Arc<dyn SymbolSource>,
    quote_assets: Vec<String>,
    ttl: Duration,
    // 갱신 중 락을 잡아 동시 요청이 거래소를 한 번만 호출하도록 함
    entry: Mutex<Option<CacheEntry>>,
}

impl SymbolCache {
    pub fn new(source: Arc<dyn SymbolSource>, quote_assets: Vec<String>, ttl: Duration) -> Self {
        Self {
            source,
            quote_assets,
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn from_config(source: Arc<dyn SymbolSource>, config: &SymbolsConfig) -> Self {
        Self::new(source, config.quote_assets.clone(), config.cache_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 심볼 목록을 조회합니다.
    ///
    /// 캐시가 비어 있는데 갱신도 실패하면 에러를 반환합니다.
    pub async fn get(&self) -> ExchangeResult<SymbolLookup> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!(count = cached.symbols.len(), "심볼 캐시 적중");
                return Ok(SymbolLookup {
                    symbols: cached.symbols.clone(),
                    status: CacheStatus::Fresh,
                });
            }
        }

        match self.source.fetch_tradable_symbols(&self.quote_assets).await {
            Ok(symbols) if !symbols.is_empty() => {
                let symbols = Arc::new(symbols);
                info!(count = symbols.len(), "심볼 목록 갱신");
                *entry = Some(CacheEntry {
                    symbols: symbols.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(SymbolLookup {
                    symbols,
                    status: CacheStatus::Refreshed,
                })
            }
            // 빈 목록은 캐시하지 않음
            Ok(symbols) => Ok(SymbolLookup {
                symbols: Arc::new(symbols),
                status: CacheStatus::Refreshed,
            }),
            Err(e) => match entry.as_ref() {
                Some(cached) => {
                    warn!(error = %e, "심볼 갱신 실패, 만료된 캐시 사용");
                    Ok(SymbolLookup {
                        symbols: cached.symbols.clone(),
                        status: CacheStatus::Stale,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// 캐시를 비웁니다.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_exchange::ExchangeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        next: StdMutex<Option<ExchangeResult<Vec<String>>>>,
    }

    impl FakeSource {
        fn respond(&self, result: ExchangeResult<Vec<String>>) {
            *self.next.lock().unwrap() = Some(result);
        }
    }

    #[async_trait]
    impl SymbolSource for FakeSource {
        async fn fetch_tradable_symbols(&self, _quote: &[String]) -> ExchangeResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.next
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(vec!["BTCUSDT".into()]))
        }
    }

    fn cache(source: &Arc<FakeSource>) -> SymbolCache {
        SymbolCache::new(
            source.clone(),
            vec!["USDT".into()],
            Duration::from_secs(3600),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_from_cache_within_ttl() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);

        assert_eq!(cache.get().await.unwrap().status, CacheStatus::Refreshed);
        tokio::time::advance(Duration::from_secs(3599)).await;
        let lookup = cache.get().await.unwrap();

        assert_eq!(lookup.status, CacheStatus::Fresh);
        assert_eq!(lookup.symbols.as_slice(), ["BTCUSDT"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_after_ttl() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);
        cache.get().await.unwrap();

        source.respond(Ok(vec!["BTCUSDT".into(), "ETHUSDT".into()]));
        tokio::time::advance(Duration::from_secs(3601)).await;
        let lookup = cache.get().await.unwrap();

        assert_eq!(lookup.status, CacheStatus::Refreshed);
        assert_eq!(lookup.symbols.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_on_failure() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);
        cache.get().await.unwrap();

        source.respond(Err(ExchangeError::Network("connection refused".into())));
        tokio::time::advance(Duration::from_secs(7200)).await;
        let lookup = cache.get().await.unwrap();

        assert_eq!(lookup.status, CacheStatus::Stale);
        assert_eq!(lookup.symbols.as_slice(), ["BTCUSDT"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_cache() {
        let source = Arc::new(FakeSource::default());
        source.respond(Err(ExchangeError::Api {
            status: 503,
            message: "unavailable".into(),
        }));
        let cache = cache(&source);

        assert!(cache.get().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let source = Arc::new(FakeSource::default());
        let cache = cache(&source);
        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
