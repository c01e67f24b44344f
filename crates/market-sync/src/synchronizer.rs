//! 심볼 단위 시장 스냅샷 동기화기.
//!
//! 구독 절차:
//! 1. 세대 번호를 올리고 이전 뷰 모델을 비운 로딩 상태를 발행
//! 2. 24h 통계와 호가 스냅샷을 동시에 조회하고 둘 다 기다림
//! 3. 성공하면 초기 뷰 모델 발행, 실패하면 에러를 발행하고 소켓을 열지 않음
//! 4. 티커/부분 호가/체결/캔들 결합 스트림 채널을 열고 메시지마다 새 뷰 모델 발행
//!
//! 재연결 때는 채널의 `prepare` 훅에서 스냅샷을 다시 받아 뷰 모델을 재구성합니다.
//! 스냅샷 실패나 재연결 포기로 끝난 구독은 `restart_if_failed`로 다시 시작합니다.
//! 구독 하나마다 태스크 하나가 뷰 모델을 소유하므로 병합 연산에는 락이 필요 없습니다.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

use market_core::{market_span, ConnectionState, MarketViewModel, Symbol};
use market_exchange::{
    combined_stream_url, market_streams, ChannelExit, ChannelHandler, ExchangeError,
    ExchangeResult, MarketPush, ReconnectingChannel, SnapshotSource,
};

use crate::error::{SyncError, SyncResult};
use crate::publisher::{FeedPublisher, MarketFeed};
use crate::settings::SyncDeps;

struct ActiveSubscription {
    symbol: Symbol,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct SyncState {
    generation: u64,
    active: Option<ActiveSubscription>,
}

/// 심볼 하나의 시세 동기화기.
pub struct MarketSynchronizer {
    deps: SyncDeps,
    tx: watch::Sender<MarketFeed>,
    state: Mutex<SyncState>,
}

impl MarketSynchronizer {
    pub fn new(deps: SyncDeps) -> Self {
        let (tx, _) = watch::channel(MarketFeed::idle(0));
        Self {
            deps,
            tx,
            state: Mutex::new(SyncState {
                generation: 0,
                active: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 심볼 구독을 시작합니다. 기존 구독은 먼저 완전히 해제됩니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn subscribe(&self, symbol: Symbol) -> watch::Receiver<MarketFeed> {
        let mut state = self.lock();
        self.start(&mut state, symbol);
        self.tx.subscribe()
    }

    /// 구독이 복구 불가능한 에러로 끝났으면 같은 심볼로 다시 구독합니다.
    ///
    /// 기존 수신기는 같은 피드를 계속 받습니다. 다시 구독했으면 `true`.
    pub fn restart_if_failed(&self) -> bool {
        let mut state = self.lock();
        let Some(symbol) = state.active.as_ref().map(|a| a.symbol.clone()) else {
            return false;
        };
        if !self.tx.borrow().is_failed() {
            return false;
        }
        info!(symbol = %symbol, "실패한 구독 재시작");
        self.start(&mut state, symbol);
        true
    }

    fn start(&self, state: &mut SyncState, symbol: Symbol) {
        if let Some(previous) = state.active.take() {
            debug!(symbol = %previous.symbol, "이전 구독 해제");
            previous.cancel.cancel();
        }

        state.generation += 1;
        let generation = state.generation;
        self.tx
            .send_replace(MarketFeed::loading(symbol.clone(), generation));

        let cancel = CancellationToken::new();
        let publisher = FeedPublisher::new(self.tx.clone(), generation, cancel.clone());
        let span = market_span!("market_sync", symbol, generation);
        let deps = self.deps.clone();
        let task_symbol = symbol.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(
            async move {
                if let Err(error) =
                    run_subscription(deps, publisher.clone(), task_symbol, task_cancel).await
                {
                    warn!(error = %error, resubscribe = error.is_fatal(), "구독 종료");
                    publisher.update(|feed| {
                        feed.is_loading = false;
                        feed.connection = ConnectionState::Closed;
                        feed.error = Some(error.to_string());
                    });
                }
            }
            .instrument(span),
        );

        info!(symbol = %symbol, generation, "구독 시작");
        state.active = Some(ActiveSubscription {
            symbol,
            cancel,
            task,
        });
    }

    /// 구독을 해제합니다. 소켓은 재연결 없이 닫힙니다.
    pub fn unsubscribe(&self) {
        let mut state = self.lock();
        if let Some(active) = state.active.take() {
            active.cancel.cancel();
            state.generation += 1;
            self.tx.send_replace(MarketFeed::idle(state.generation));
            info!(symbol = %active.symbol, "구독 해제");
        }
    }

    pub fn current_symbol(&self) -> Option<Symbol> {
        self.lock().active.as_ref().map(|a| a.symbol.clone())
    }

    /// 피드 수신기.
    pub fn feed(&self) -> watch::Receiver<MarketFeed> {
        self.tx.subscribe()
    }

    /// 현재 피드 스냅샷.
    pub fn current(&self) -> MarketFeed {
        self.tx.borrow().clone()
    }

    /// 구독 태스크가 끝났는지 확인 (포기, 스냅샷 실패, 해제).
    pub fn is_finished(&self) -> bool {
        self.lock()
            .active
            .as_ref()
            .map_or(true, |a| a.task.is_finished())
    }
}

impl Drop for MarketSynchronizer {
    fn drop(&mut self) {
        if let Some(active) = self.lock().active.take() {
            active.cancel.cancel();
        }
    }
}

// ============================================================================
// 구독 태스크
// ============================================================================

async fn fetch_snapshot(
    source: &dyn SnapshotSource,
    symbol: &Symbol,
    depth_limit: u32,
) -> ExchangeResult<MarketViewModel> {
    let (ticker, depth) = tokio::try_join!(
        source.fetch_ticker_24h(symbol),
        source.fetch_depth(symbol, depth_limit)
    )?;
    Ok(MarketViewModel::from_snapshot(symbol.clone(), ticker, depth))
}

/// 구독 하나의 수명. 복구 불가능한 종료는 에러로 반환합니다.
async fn run_subscription(
    deps: SyncDeps,
    publisher: FeedPublisher,
    symbol: Symbol,
    cancel: CancellationToken,
) -> SyncResult<()> {
    let settings = &deps.settings;

    let snapshot = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = fetch_snapshot(deps.source.as_ref(), &symbol, settings.depth_limit) => result,
    };

    // 실패하면 소켓을 열지 않음
    let view = Arc::new(snapshot.map_err(SyncError::snapshot)?);

    if !publisher.publish_view(view.clone()) {
        return Ok(());
    }
    debug!("초기 스냅샷 발행");

    let streams = market_streams(&symbol, settings.depth_limit, settings.kline_interval);
    let channel = ReconnectingChannel::new(
        combined_stream_url(&settings.ws_base_url, &streams),
        deps.transport.clone(),
        settings.backoff,
    )
    .with_name(format!("market:{symbol}"));

    let mut handler = MarketChannelHandler {
        source: deps.source.clone(),
        publisher,
        symbol,
        depth_limit: settings.depth_limit,
        trade_cap: settings.trade_history,
        view,
    };

    match channel.run(&mut handler, &cancel).await {
        ChannelExit::Cancelled => {
            debug!("채널 취소됨");
            Ok(())
        }
        ChannelExit::GaveUp => Err(SyncError::ChannelClosedPermanently),
        ChannelExit::PrepareFailed(e) => Err(SyncError::snapshot(e)),
    }
}

/// 채널 이벤트를 뷰 모델 병합 규칙에 연결합니다.
struct MarketChannelHandler {
    source: Arc<dyn SnapshotSource>,
    publisher: FeedPublisher,
    symbol: Symbol,
    depth_limit: u32,
    trade_cap: usize,
    view: Arc<MarketViewModel>,
}

impl MarketChannelHandler {
    fn apply(&self, push: MarketPush) -> Option<MarketViewModel> {
        match push {
            MarketPush::Ticker(update) => Some(self.view.with_ticker(&update)),
            MarketPush::Depth { bids, asks } => Some(self.view.with_depth(bids, asks)),
            MarketPush::Trade(trade) => {
                let id = trade.id;
                let next = self.view.with_trade(trade, self.trade_cap);
                if next.is_none() {
                    trace!(trade_id = id, "중복 체결 무시");
                }
                next
            }
            MarketPush::Kline(bar) => Some(self.view.with_kline(bar)),
        }
    }
}

#[async_trait]
impl ChannelHandler for MarketChannelHandler {
    async fn prepare(&mut self, attempt: u32) -> ExchangeResult<()> {
        debug!(attempt, "재연결 전 스냅샷 재조회");
        let view = fetch_snapshot(self.source.as_ref(), &self.symbol, self.depth_limit).await?;
        self.view = Arc::new(view);
        self.publisher.publish_view(self.view.clone());
        Ok(())
    }

    fn on_state(&mut self, state: ConnectionState, attempt: u32) {
        self.publisher.update(|feed| {
            feed.connection = state;
            if state.is_connected() {
                feed.error = None;
            }
        });
        debug!(%state, attempt, "연결 상태 전이");
    }

    fn on_message(&mut self, text: &str) {
        let push = match MarketPush::parse(text) {
            Ok(push) => push,
            Err(e) => {
                let error = SyncError::MalformedMessage(e.to_string());
                warn!(error = %error, "메시지 폐기");
                self.publisher
                    .update(|feed| feed.malformed_messages += 1);
                return;
            }
        };

        if let Some(next) = self.apply(push) {
            self.view = Arc::new(next);
            self.publisher.publish_view(self.view.clone());
        }
    }

    fn on_error(&mut self, error: &ExchangeError) {
        let error = SyncError::ChannelError(error.to_string());
        self.publisher.update(|feed| feed.error = Some(error.to_string()));
    }
}
