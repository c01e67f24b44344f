//! 전체 시장 티커 팬아웃 스트림.
//!
//! 구독 심볼 수나 소비자 수와 관계없이 `!miniTicker@arr` 소켓 하나만 엽니다.
//! 브로드캐스트 배치마다 구독 심볼만 골라 맵에 반영하고, 실제로 바뀐 항목이
//! 있을 때만 새 맵을 발행합니다. 심볼 집합을 바꿔도 소켓은 다시 열지 않습니다.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use market_core::{merge_tickers, retain_tickers, ConnectionState, Symbol, TickerMap};
use market_exchange::{
    mini_ticker_url, parse_mini_ticker_batch, ChannelExit, ChannelHandler, ExchangeError,
    ReconnectingChannel, Transport,
};

use crate::error::SyncError;
use crate::settings::SyncSettings;

/// 소비자에게 발행되는 티커 맵 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerFeed {
    pub generation: u64,
    pub tickers: Arc<TickerMap>,
    pub connection: ConnectionState,
    pub error: Option<String>,
}

impl TickerFeed {
    fn empty(generation: u64, connection: ConnectionState) -> Self {
        Self {
            generation,
            tickers: Arc::new(TickerMap::new()),
            connection,
            error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// 재연결을 포기해 더 이상 갱신되지 않는 상태인지 확인.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() && self.connection == ConnectionState::Closed
    }
}

type SymbolSet = Arc<RwLock<HashSet<String>>>;

struct StreamState {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// 전체 시장 미니 티커 스트림.
pub struct TickerStream {
    transport: Arc<dyn Transport>,
    settings: SyncSettings,
    symbols: SymbolSet,
    tx: watch::Sender<TickerFeed>,
    state: Mutex<StreamState>,
}

fn normalize(symbols: &[Symbol]) -> HashSet<String> {
    symbols.iter().map(|s| s.as_str().to_string()).collect()
}

impl TickerStream {
    pub fn new(transport: Arc<dyn Transport>, settings: SyncSettings) -> Self {
        let (tx, _) = watch::channel(TickerFeed::empty(0, ConnectionState::Closed));
        Self {
            transport,
            settings,
            symbols: Arc::new(RwLock::new(HashSet::new())),
            tx,
            state: Mutex::new(StreamState {
                generation: 0,
                cancel: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 심볼 집합으로 구독합니다.
    ///
    /// 이미 실행 중이면 소켓을 유지한 채 심볼 집합만 교체합니다.
    /// 재연결을 포기한 스트림은 새 세대로 다시 시작합니다.
    pub fn subscribe(&self, symbols: &[Symbol]) -> watch::Receiver<TickerFeed> {
        let mut state = self.lock();
        if state.cancel.is_some() && !self.tx.borrow().is_failed() {
            drop(state);
            self.set_symbols(symbols);
            return self.tx.subscribe();
        }
        if let Some(previous) = state.cancel.take() {
            previous.cancel();
            info!(generation = state.generation, "실패한 티커 스트림 재시작");
        }

        *self
            .symbols
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = normalize(symbols);

        state.generation += 1;
        let generation = state.generation;
        self.tx
            .send_replace(TickerFeed::empty(generation, ConnectionState::Connecting));

        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());

        let channel = ReconnectingChannel::new(
            mini_ticker_url(&self.settings.ws_base_url),
            self.transport.clone(),
            self.settings.backoff,
        )
        .with_name("tickers");
        let mut handler = TickerChannelHandler {
            tx: self.tx.clone(),
            generation,
            symbols: self.symbols.clone(),
        };

        let span = tracing::info_span!("ticker_stream", generation);
        tokio::spawn(
            async move {
                match channel.run(&mut handler, &cancel).await {
                    ChannelExit::Cancelled => debug!("티커 스트림 취소됨"),
                    ChannelExit::GaveUp | ChannelExit::PrepareFailed(_) => {
                        handler.publish(|feed| {
                            feed.connection = ConnectionState::Closed;
                            feed.error = Some(SyncError::ChannelClosedPermanently.to_string());
                            true
                        });
                    }
                }
            }
            .instrument(span),
        );

        info!(symbols = symbols.len(), generation, "티커 스트림 시작");
        self.tx.subscribe()
    }

    /// 구독 심볼 집합을 교체합니다. 집합 밖의 항목은 맵에서 제거됩니다.
    pub fn set_symbols(&self, symbols: &[Symbol]) {
        let next = normalize(symbols);
        *self
            .symbols
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next.clone();

        let pruned = self.tx.send_if_modified(|feed| match retain_tickers(&feed.tickers, &next) {
            Some(map) => {
                feed.tickers = Arc::new(map);
                true
            }
            None => false,
        });
        debug!(symbols = next.len(), pruned, "티커 심볼 집합 교체");
    }

    /// 현재 구독 심볼 (정렬됨).
    pub fn symbols(&self) -> Vec<String> {
        let set = self
            .symbols
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut symbols: Vec<String> = set.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    /// 소켓을 닫고 맵을 비웁니다.
    pub fn unsubscribe(&self) {
        let mut state = self.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
            state.generation += 1;
            self.tx
                .send_replace(TickerFeed::empty(state.generation, ConnectionState::Closed));
            info!("티커 스트림 해제");
        }
    }

    pub fn feed(&self) -> watch::Receiver<TickerFeed> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> TickerFeed {
        self.tx.borrow().clone()
    }

    /// 소켓이 열려 있거나 재연결 중인지 확인. 포기한 스트림은 `false`.
    pub fn is_running(&self) -> bool {
        let state = self.lock();
        state.cancel.is_some() && !self.tx.borrow().is_failed()
    }
}

impl Drop for TickerStream {
    fn drop(&mut self) {
        if let Some(cancel) = self.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

struct TickerChannelHandler {
    tx: watch::Sender<TickerFeed>,
    generation: u64,
    symbols: SymbolSet,
}

impl TickerChannelHandler {
    fn publish(&self, apply: impl FnOnce(&mut TickerFeed) -> bool) -> bool {
        self.tx.send_if_modified(|feed| {
            if feed.generation != self.generation {
                return false;
            }
            apply(feed)
        })
    }
}

impl ChannelHandler for TickerChannelHandler {
    fn on_state(&mut self, state: ConnectionState, _attempt: u32) {
        self.publish(|feed| {
            feed.connection = state;
            if state.is_connected() {
                feed.error = None;
            }
            true
        });
    }

    fn on_message(&mut self, text: &str) {
        let batch = match parse_mini_ticker_batch(text) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %SyncError::MalformedMessage(e.to_string()), "티커 배치 폐기");
                return;
            }
        };

        let symbols = self.symbols.clone();
        self.publish(|feed| {
            let symbols = symbols
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match merge_tickers(&feed.tickers, &batch, &symbols) {
                Some(map) => {
                    feed.tickers = Arc::new(map);
                    true
                }
                None => false,
            }
        });
    }

    fn on_error(&mut self, error: &ExchangeError) {
        let message = SyncError::ChannelError(error.to_string()).to_string();
        self.publish(|feed| {
            feed.error = Some(message);
            true
        });
    }
}
