//! 네트워크 없이 채널과 동기화 계층을 구동하기 위한 테스트 더블.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify, Semaphore};

use market_core::{DepthLevel, DepthSnapshot, Symbol, Ticker24h};

use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::SnapshotSource;
use crate::websocket::{Connection, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// ScriptedTransport
// ============================================================================

enum Frame {
    Text(String),
    Error(String),
}

#[derive(Default)]
struct TransportState {
    urls: Vec<String>,
    failures_left: u32,
    current: Option<mpsc::UnboundedSender<Frame>>,
}

/// 스크립트로 조종하는 전송 계층.
///
/// 가장 최근에 열린 연결로 프레임을 밀어 넣거나 연결을 끊을 수 있습니다.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
    connected: Arc<Notify>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `n`번의 연결 시도를 실패시킵니다.
    pub fn fail_connects(&self, n: u32) {
        lock(&self.state).failures_left = n;
    }

    /// 현재 연결에 텍스트 프레임을 보냅니다. 연결이 없으면 `false`.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Frame::Text(text.into()))
    }

    /// 현재 연결에 전송 에러를 주입합니다.
    pub fn send_error(&self, message: impl Into<String>) -> bool {
        self.push(Frame::Error(message.into()))
    }

    fn push(&self, frame: Frame) -> bool {
        lock(&self.state)
            .current
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// 서버 측에서 연결을 끊습니다.
    pub fn drop_connection(&self) {
        lock(&self.state).current = None;
    }

    /// 실패를 포함한 연결 시도 횟수.
    pub fn connect_count(&self) -> usize {
        lock(&self.state).urls.len()
    }

    /// 지금까지 연결을 시도한 URL.
    pub fn urls(&self) -> Vec<String> {
        lock(&self.state).urls.clone()
    }

    /// 클라이언트가 `close()`를 호출한 횟수.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// 연결 시도가 `n`번 이상 일어날 때까지 기다립니다.
    pub async fn wait_for_connects(&self, n: usize) {
        loop {
            let notified = self.connected.notified();
            if self.connect_count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, url: &str) -> ExchangeResult<Box<dyn Connection>> {
        let result = {
            let mut state = lock(&self.state);
            state.urls.push(url.to_string());
            if state.failures_left > 0 {
                state.failures_left -= 1;
                Err(ExchangeError::WebSocket("scripted connect failure".to_string()))
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                state.current = Some(tx);
                Ok(Box::new(ScriptedConnection {
                    rx,
                    closes: self.closes.clone(),
                }) as Box<dyn Connection>)
            }
        };
        self.connected.notify_waiters();
        result
    }
}

struct ScriptedConnection {
    rx: mpsc::UnboundedReceiver<Frame>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn next_text(&mut self) -> Option<ExchangeResult<String>> {
        match self.rx.recv().await? {
            Frame::Text(text) => Some(Ok(text)),
            Frame::Error(message) => Some(Err(ExchangeError::WebSocket(message))),
        }
    }

    async fn close(&mut self) {
        self.rx.close();
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// MockSnapshotSource
// ============================================================================

#[derive(Default)]
struct SnapshotState {
    tickers: HashMap<String, Ticker24h>,
    depths: HashMap<String, DepthSnapshot>,
    failures: HashMap<String, ExchangeError>,
    gates: HashMap<String, Arc<Semaphore>>,
    fetches: HashMap<String, usize>,
}

/// 응답을 미리 정해 두는 스냅샷 공급자.
#[derive(Clone, Default)]
pub struct MockSnapshotSource {
    state: Arc<Mutex<SnapshotState>>,
}

/// 열릴 때까지 해당 심볼의 24h 통계 응답을 붙잡아 두는 관문.
#[derive(Clone)]
pub struct SnapshotGate {
    semaphore: Arc<Semaphore>,
}

impl SnapshotGate {
    /// 대기 중인 요청과 이후 요청을 모두 통과시킵니다.
    pub fn open(&self) {
        self.semaphore.close();
    }
}

impl MockSnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼의 스냅샷을 등록합니다.
    pub fn set_snapshot(&self, symbol: &str, ticker: Ticker24h, depth: DepthSnapshot) {
        let mut state = lock(&self.state);
        state.tickers.insert(symbol.to_string(), ticker);
        state.depths.insert(symbol.to_string(), depth);
    }

    pub fn with_snapshot(self, symbol: &str, ticker: Ticker24h, depth: DepthSnapshot) -> Self {
        self.set_snapshot(symbol, ticker, depth);
        self
    }

    /// 이후 요청을 주어진 에러로 실패시킵니다.
    pub fn fail(&self, symbol: &str, error: ExchangeError) {
        lock(&self.state).failures.insert(symbol.to_string(), error);
    }

    pub fn clear_failure(&self, symbol: &str) {
        lock(&self.state).failures.remove(symbol);
    }

    /// 해당 심볼의 응답을 관문이 열릴 때까지 지연시킵니다.
    pub fn gate(&self, symbol: &str) -> SnapshotGate {
        let semaphore = Arc::new(Semaphore::new(0));
        lock(&self.state)
            .gates
            .insert(symbol.to_string(), semaphore.clone());
        SnapshotGate { semaphore }
    }

    /// 24h 통계 요청 횟수.
    pub fn fetch_count(&self, symbol: &str) -> usize {
        lock(&self.state).fetches.get(symbol).copied().unwrap_or(0)
    }

    fn lookup<T: Clone>(
        &self,
        symbol: &Symbol,
        pick: impl Fn(&SnapshotState) -> Option<&T>,
    ) -> ExchangeResult<T> {
        let state = lock(&self.state);
        if let Some(error) = state.failures.get(symbol.as_str()) {
            return Err(error.clone());
        }
        pick(&state).cloned().ok_or_else(|| ExchangeError::Api {
            status: 400,
            message: "Invalid symbol.".to_string(),
        })
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn fetch_ticker_24h(&self, symbol: &Symbol) -> ExchangeResult<Ticker24h> {
        let gate = {
            let mut state = lock(&self.state);
            *state.fetches.entry(symbol.to_string()).or_default() += 1;
            state.gates.get(symbol.as_str()).cloned()
        };
        if let Some(gate) = gate {
            // 관문이 닫히면(close) 에러로 깨어나며 통과
            let _ = gate.acquire().await;
        }
        self.lookup(symbol, |s| s.tickers.get(symbol.as_str()))
    }

    async fn fetch_depth(&self, symbol: &Symbol, _limit: u32) -> ExchangeResult<DepthSnapshot> {
        self.lookup(symbol, |s| s.depths.get(symbol.as_str()))
    }
}

/// 테스트용 24h 통계.
pub fn sample_ticker(last_price: &str) -> Ticker24h {
    Ticker24h {
        last_price: last_price.to_string(),
        price_change_percent: "1.00".to_string(),
        volume: "1000.0".to_string(),
        quote_volume: "50000000.0".to_string(),
        high_price: "51000.00".to_string(),
        low_price: "49000.00".to_string(),
    }
}

/// 테스트용 호가 스냅샷 (최우선 매수/매도 한 단계씩).
pub fn sample_depth(bid: &str, ask: &str) -> DepthSnapshot {
    DepthSnapshot {
        bids: vec![DepthLevel::new(bid, "1.0")],
        asks: vec![DepthLevel::new(ask, "1.0")],
    }
}
