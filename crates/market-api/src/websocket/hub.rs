//! 티커 WebSocket 세션 허브.
//!
//! 모든 `/ws/tickers` 세션이 상류 미니 티커 소켓 하나를 공유합니다. 상류 심볼 집합은
//! 관심 목록과 접속 중인 세션이 요청한 심볼의 합집합이며, 세션이 드나들 때 소켓을
//! 다시 열지 않고 집합만 바꿉니다. 마지막 세션이 나가면 상류 소켓을 닫습니다.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use market_core::Symbol;
use market_sync::{TickerFeed, TickerStream};

/// 상류 티커 스트림 공유 허브.
pub struct TickerHub {
    stream: TickerStream,
    watchlist: Vec<Symbol>,
    sessions: Mutex<HashMap<Uuid, Vec<Symbol>>>,
}

impl TickerHub {
    pub fn new(stream: TickerStream, watchlist: Vec<Symbol>) -> Self {
        Self {
            stream,
            watchlist,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Vec<Symbol>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 세션이 볼 심볼. 요청이 비어 있으면 관심 목록.
    pub fn resolve(&self, requested: Vec<Symbol>) -> Vec<Symbol> {
        if requested.is_empty() {
            self.watchlist.clone()
        } else {
            requested
        }
    }

    fn union(&self, sessions: &HashMap<Uuid, Vec<Symbol>>) -> Vec<Symbol> {
        let set: BTreeSet<Symbol> = self
            .watchlist
            .iter()
            .chain(sessions.values().flatten())
            .cloned()
            .collect();
        set.into_iter().collect()
    }

    /// 세션을 등록하고 공유 피드를 반환합니다.
    pub fn join(&self, session: Uuid, symbols: Vec<Symbol>) -> watch::Receiver<TickerFeed> {
        let mut sessions = self.lock();
        sessions.insert(session, symbols);
        let union = self.union(&sessions);

        let rx = if self.stream.is_running() {
            self.stream.set_symbols(&union);
            self.stream.feed()
        } else {
            info!(symbols = union.len(), "상류 티커 스트림 시작");
            self.stream.subscribe(&union)
        };
        debug!(%session, sessions = sessions.len(), "티커 세션 등록");
        rx
    }

    /// 세션을 해제합니다.
    pub fn leave(&self, session: Uuid) {
        let mut sessions = self.lock();
        if sessions.remove(&session).is_none() {
            return;
        }

        if sessions.is_empty() {
            self.stream.unsubscribe();
            info!("마지막 티커 세션 종료, 상류 스트림 해제");
        } else {
            let union = self.union(&sessions);
            self.stream.set_symbols(&union);
        }
        debug!(%session, sessions = sessions.len(), "티커 세션 해제");
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// 상류에서 받고 있는 심볼.
    pub fn upstream_symbols(&self) -> Vec<String> {
        self.stream.symbols()
    }

    /// 상류 소켓이 열려 있는지 (재연결 중 포함).
    pub fn is_running(&self) -> bool {
        self.stream.is_running()
    }

    pub fn shutdown(&self) {
        self.lock().clear();
        self.stream.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_exchange::testing::ScriptedTransport;
    use market_sync::SyncSettings;
    use std::sync::Arc;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn hub(transport: &ScriptedTransport) -> TickerHub {
        TickerHub::new(
            TickerStream::new(Arc::new(transport.clone()), SyncSettings::default()),
            vec![sym("BTCUSDT")],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_share_one_upstream() {
        let transport = ScriptedTransport::new();
        let hub = hub(&transport);

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        hub.join(a, vec![sym("ETHUSDT")]);
        hub.join(b, vec![sym("SOLUSDT")]);
        transport.wait_for_connects(1).await;

        assert_eq!(hub.upstream_symbols(), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

        hub.leave(a);
        assert_eq!(hub.upstream_symbols(), vec!["BTCUSDT", "SOLUSDT"]);

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(hub.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_session_closes_upstream() {
        let transport = ScriptedTransport::new();
        let hub = hub(&transport);

        let a = Uuid::new_v4();
        hub.join(a, hub.resolve(Vec::new()));
        transport.wait_for_connects(1).await;
        hub.leave(a);

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(transport.close_count(), 1);
        assert_eq!(hub.session_count(), 0);

        // 다시 들어오면 새 소켓
        hub.join(Uuid::new_v4(), Vec::new());
        transport.wait_for_connects(2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reconnects_after_upstream_gave_up() {
        let transport = ScriptedTransport::new();
        let hub = hub(&transport);

        transport.fail_connects(u32::MAX);
        let mut rx = hub.join(Uuid::new_v4(), vec![sym("ETHUSDT")]);
        tokio::time::timeout(std::time::Duration::from_secs(120), rx.wait_for(|f| f.is_failed()))
            .await
            .unwrap()
            .unwrap();
        assert!(!hub.is_running());
        let attempts = transport.connect_count();

        transport.fail_connects(0);
        let rx = hub.join(Uuid::new_v4(), vec![sym("SOLUSDT")]);
        transport.wait_for_connects(attempts + 1).await;

        assert!(hub.is_running());
        assert!(rx.borrow().error.is_none());
        assert_eq!(hub.upstream_symbols(), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(hub.session_count(), 2);
    }
}
