//! 구독 인스턴스 단위 발행기.
//!
//! 심볼이 바뀌면 새 구독은 새 세대 번호로 피드를 교체합니다. 이전 구독의 늦은
//! 비동기 작업(REST 응답, 소켓 메시지)은 세대가 다르므로 피드에 반영되지 않습니다.
//! 세대 비교는 watch 채널 내부 락 안에서 이루어지므로 교체와 경쟁하지 않습니다.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use market_core::{ConnectionState, MarketViewModel, Symbol};

/// 소비자에게 발행되는 심볼 시세 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFeed {
    /// 구독 중인 심볼. 구독이 없으면 `None`.
    pub symbol: Option<Symbol>,
    /// 구독 인스턴스 세대 번호
    pub generation: u64,
    /// 최신 뷰 모델. 스냅샷 도착 전에는 `None`.
    pub view: Option<Arc<MarketViewModel>>,
    pub connection: ConnectionState,
    pub is_loading: bool,
    pub error: Option<String>,
    /// 형식 오류로 버린 메시지 수
    pub malformed_messages: u64,
}

impl MarketFeed {
    /// 구독 없음.
    pub fn idle(generation: u64) -> Self {
        Self {
            symbol: None,
            generation,
            view: None,
            connection: ConnectionState::Closed,
            is_loading: false,
            error: None,
            malformed_messages: 0,
        }
    }

    /// 새 구독 시작 직후 (이전 뷰 모델 없음).
    pub fn loading(symbol: Symbol, generation: u64) -> Self {
        Self {
            symbol: Some(symbol),
            generation,
            view: None,
            connection: ConnectionState::Connecting,
            is_loading: true,
            error: None,
            malformed_messages: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// 더 이상 갱신되지 않는 실패 상태인지 확인.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() && self.connection == ConnectionState::Closed && !self.is_loading
    }
}

/// 한 구독 인스턴스의 발행 권한.
#[derive(Clone)]
pub struct FeedPublisher {
    tx: watch::Sender<MarketFeed>,
    generation: u64,
    cancel: CancellationToken,
}

impl FeedPublisher {
    pub fn new(tx: watch::Sender<MarketFeed>, generation: u64, cancel: CancellationToken) -> Self {
        Self {
            tx,
            generation,
            cancel,
        }
    }

    /// 아직 현재 구독인지 확인.
    pub fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && self.tx.borrow().generation == self.generation
    }

    /// 현재 구독일 때만 피드를 수정해 발행합니다. 반영되면 `true`.
    pub fn update(&self, apply: impl FnOnce(&mut MarketFeed)) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send_if_modified(|feed| {
            if feed.generation != self.generation {
                return false;
            }
            apply(feed);
            true
        })
    }

    /// 현재 뷰 모델을 교체합니다.
    pub fn publish_view(&self, view: Arc<MarketViewModel>) -> bool {
        self.update(|feed| {
            feed.view = Some(view);
            feed.is_loading = false;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Symbol {
        Symbol::parse("BTCUSDT").unwrap()
    }

    #[test]
    fn test_stale_generation_ignored() {
        let (tx, rx) = watch::channel(MarketFeed::loading(btc(), 1));
        let stale = FeedPublisher::new(tx.clone(), 1, CancellationToken::new());

        tx.send_replace(MarketFeed::loading(Symbol::parse("ETHUSDT").unwrap(), 2));
        assert!(!stale.is_live());
        assert!(!stale.update(|feed| feed.error = Some("late".into())));
        assert_eq!(rx.borrow().symbol.as_ref().map(Symbol::as_str), Some("ETHUSDT"));
        assert!(rx.borrow().error.is_none());
    }

    #[test]
    fn test_cancelled_publisher_ignored() {
        let (tx, rx) = watch::channel(MarketFeed::loading(btc(), 1));
        let cancel = CancellationToken::new();
        let publisher = FeedPublisher::new(tx, 1, cancel.clone());

        assert!(publisher.update(|feed| feed.is_loading = false));
        cancel.cancel();
        assert!(!publisher.update(|feed| feed.is_loading = true));
        assert!(!rx.borrow().is_loading);
    }

    #[test]
    fn test_failed_flag() {
        let mut feed = MarketFeed::loading(btc(), 1);
        assert!(!feed.is_failed());
        feed.is_loading = false;
        feed.connection = ConnectionState::Closed;
        feed.error = Some("boom".into());
        assert!(feed.is_failed());
    }
}
