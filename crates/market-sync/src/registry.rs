//! 공유 구독 레지스트리.
//!
//! 심볼마다 동기화기를 최대 하나만 두고, 그 심볼을 보는 모든 소비자(호가창, 차트,
//! 체결 목록, 상단 바)가 같은 피드를 받습니다. 핸들 참조 횟수로 수명을 관리하며
//! 마지막 핸들이 해제되면 동기화기를 해제해 소켓을 닫습니다.
//!
//! 동기화기를 만들고 없애는 곳은 이 레지스트리뿐입니다.

use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info};

use market_core::Symbol;

use crate::publisher::MarketFeed;
use crate::settings::SyncDeps;
use crate::synchronizer::MarketSynchronizer;

struct Entry {
    sync: Arc<MarketSynchronizer>,
    consumers: usize,
}

struct RegistryInner {
    deps: SyncDeps,
    entries: Mutex<HashMap<Symbol, Entry>>,
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Symbol, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn retain(&self, symbol: &Symbol, sync: &Arc<MarketSynchronizer>) {
        if let Some(entry) = self.lock().get_mut(symbol) {
            if Arc::ptr_eq(&entry.sync, sync) {
                entry.consumers += 1;
            }
        }
    }

    fn release(&self, symbol: &Symbol, sync: &Arc<MarketSynchronizer>) {
        let mut entries = self.lock();
        // shutdown 이후 같은 심볼로 새로 만든 항목은 건드리지 않음
        let Some(entry) = entries
            .get_mut(symbol)
            .filter(|entry| Arc::ptr_eq(&entry.sync, sync))
        else {
            return;
        };
        entry.consumers = entry.consumers.saturating_sub(1);
        if entry.consumers == 0 {
            if let Some(entry) = entries.remove(symbol) {
                entry.sync.unsubscribe();
                info!(symbol = %symbol, "마지막 소비자 해제, 동기화기 종료");
            }
        }
    }
}

/// 프로세스 전역 구독 레지스트리.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new(deps: SyncDeps) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                deps,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// 심볼 피드 핸들을 얻습니다. 첫 소비자일 때만 동기화기를 만들고 구독합니다.
    ///
    /// 기존 동기화기가 복구 불가능한 에러로 끝나 있으면 다시 구독시킵니다.
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn acquire(&self, symbol: Symbol) -> MarketHandle {
        let mut entries = self.inner.lock();
        let entry = match entries.entry(symbol.clone()) {
            hash_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.sync.restart_if_failed();
                entry
            }
            hash_map::Entry::Vacant(vacant) => {
                let sync = Arc::new(MarketSynchronizer::new(self.inner.deps.clone()));
                sync.subscribe(symbol.clone());
                debug!(symbol = %symbol, "동기화기 생성");
                vacant.insert(Entry { sync, consumers: 0 })
            }
        };
        entry.consumers += 1;

        MarketHandle {
            registry: Arc::downgrade(&self.inner),
            symbol,
            sync: entry.sync.clone(),
        }
    }

    /// 동기화기가 살아 있는 심볼 (정렬됨).
    pub fn active_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.inner.lock().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn consumer_count(&self, symbol: &Symbol) -> usize {
        self.inner
            .lock()
            .get(symbol)
            .map_or(0, |entry| entry.consumers)
    }

    /// 모든 동기화기를 해제합니다. 남은 핸들은 더 이상 갱신을 받지 않습니다.
    pub fn shutdown(&self) {
        let drained: Vec<Entry> = self.inner.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.sync.unsubscribe();
        }
        info!(count = drained.len(), "레지스트리 종료");
    }
}

/// 심볼 피드에 대한 소비자 핸들.
///
/// 복제하면 소비자가 하나 늘고, 해제하면 하나 줄어듭니다.
pub struct MarketHandle {
    registry: Weak<RegistryInner>,
    symbol: Symbol,
    sync: Arc<MarketSynchronizer>,
}

impl MarketHandle {
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn feed(&self) -> watch::Receiver<MarketFeed> {
        self.sync.feed()
    }

    pub fn current(&self) -> MarketFeed {
        self.sync.current()
    }

    /// 피드가 실패 상태면 동기화기를 다시 구독시킵니다. 다른 소비자도 새 피드를 받습니다.
    pub fn retry(&self) -> bool {
        self.sync.restart_if_failed()
    }
}

impl Clone for MarketHandle {
    fn clone(&self) -> Self {
        if let Some(registry) = self.registry.upgrade() {
            registry.retain(&self.symbol, &self.sync);
        }
        Self {
            registry: self.registry.clone(),
            symbol: self.symbol.clone(),
            sync: self.sync.clone(),
        }
    }
}

impl Drop for MarketHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.symbol, &self.sync);
        }
    }
}

impl std::fmt::Debug for MarketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketHandle")
            .field("symbol", &self.symbol)
            .finish()
    }
}

// ============================================================================
// 페이지
// ============================================================================

/// 활성 심볼 하나를 보여 주는 페이지 단위 구독.
///
/// 심볼을 바꾸면 이전 심볼을 먼저 해제한 뒤 새 심볼을 얻습니다.
/// 페이지를 버리면 언마운트됩니다.
pub struct MarketPage {
    registry: SubscriptionRegistry,
    current: Option<MarketHandle>,
}

impl MarketPage {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    /// 표시 심볼을 바꾸고 새 피드를 반환합니다.
    ///
    /// 같은 심볼이면 기존 피드를 그대로 쓰되, 실패한 피드면 다시 구독합니다.
    pub fn switch_symbol(&mut self, symbol: Symbol) -> watch::Receiver<MarketFeed> {
        if let Some(handle) = &self.current {
            if handle.symbol() == &symbol {
                handle.retry();
                return handle.feed();
            }
        }

        self.current = None;
        let handle = self.registry.acquire(symbol);
        let feed = handle.feed();
        self.current = Some(handle);
        feed
    }

    pub fn unmount(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!(symbol = %handle.symbol(), "페이지 언마운트");
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.current.as_ref().map(MarketHandle::symbol)
    }

    pub fn feed(&self) -> Option<watch::Receiver<MarketFeed>> {
        self.current.as_ref().map(MarketHandle::feed)
    }

    /// 같은 페이지의 다른 구성 요소에 넘길 핸들.
    pub fn handle(&self) -> Option<MarketHandle> {
        self.current.clone()
    }
}
