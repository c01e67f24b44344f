//! 공유 구독 레지스트리와 페이지 수명 테스트.

use std::sync::Arc;
use std::time::Duration;

use market_core::Symbol;
use market_exchange::testing::{sample_depth, sample_ticker, MockSnapshotSource, ScriptedTransport};
use market_exchange::ExchangeError;
use market_sync::{MarketPage, SubscriptionRegistry, SyncDeps, SyncSettings};

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

fn registry() -> (SubscriptionRegistry, MockSnapshotSource, ScriptedTransport) {
    let source = MockSnapshotSource::new()
        .with_snapshot("BTCUSDT", sample_ticker("50000.00"), sample_depth("49999.00", "50001.00"))
        .with_snapshot("ETHUSDT", sample_ticker("3000.00"), sample_depth("2999.00", "3001.00"));
    let transport = ScriptedTransport::new();
    let registry = SubscriptionRegistry::new(SyncDeps::new(
        Arc::new(source.clone()),
        Arc::new(transport.clone()),
        SyncSettings::default(),
    ));
    (registry, source, transport)
}

#[tokio::test(start_paused = true)]
async fn test_consumers_share_one_synchronizer() {
    let (registry, source, transport) = registry();

    let order_book = registry.acquire(sym("BTCUSDT"));
    let chart = registry.acquire(sym("BTCUSDT"));
    let trade_tape = chart.clone();

    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 3);
    assert_eq!(registry.active_symbols(), vec![sym("BTCUSDT")]);

    transport.wait_for_connects(1).await;
    let mut rx = order_book.feed();
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|f| f.is_connected()))
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(source.fetch_count("BTCUSDT"), 1);

    let a = order_book.current().view.unwrap();
    let b = trade_tape.current().view.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test(start_paused = true)]
async fn test_last_handle_tears_down() {
    let (registry, _source, transport) = registry();

    let first = registry.acquire(sym("BTCUSDT"));
    let second = registry.acquire(sym("BTCUSDT"));
    transport.wait_for_connects(1).await;

    drop(first);
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.close_count(), 0);

    let mut rx = second.feed();
    drop(second);
    assert!(registry.active_symbols().is_empty());
    assert!(rx.borrow_and_update().symbol.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.close_count(), 1);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_switch_releases_previous_symbol() {
    let (registry, _source, transport) = registry();
    let mut page = MarketPage::new(registry.clone());

    let mut rx = page.switch_symbol(sym("BTCUSDT"));
    transport.wait_for_connects(1).await;
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|f| f.view.is_some()))
        .await
        .unwrap()
        .unwrap();

    let mut rx = page.switch_symbol(sym("ETHUSDT"));
    assert_eq!(registry.active_symbols(), vec![sym("ETHUSDT")]);
    assert_eq!(page.symbol(), Some(&sym("ETHUSDT")));

    let feed = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|f| f.view.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(feed.view.unwrap().symbol.as_str(), "ETHUSDT");

    transport.wait_for_connects(2).await;
    assert!(transport.urls()[1].contains("ethusdt@trade"));

    // 같은 심볼로 다시 전환해도 새로 구독하지 않음
    let _ = page.switch_symbol(sym("ETHUSDT"));
    assert_eq!(registry.consumer_count(&sym("ETHUSDT")), 1);

    drop(page);
    assert!(registry.active_symbols().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_page_handle_counts_as_consumer() {
    let (registry, _source, _transport) = registry();
    let mut page = MarketPage::new(registry.clone());
    page.switch_symbol(sym("BTCUSDT"));

    let top_bar = page.handle().unwrap();
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 2);

    page.unmount();
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 1);
    assert!(page.feed().is_none());

    drop(top_bar);
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 0);
    assert!(registry.active_symbols().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_all() {
    let (registry, _source, _transport) = registry();
    let btc = registry.acquire(sym("BTCUSDT"));
    let _eth = registry.acquire(sym("ETHUSDT"));

    registry.shutdown();
    assert!(registry.active_symbols().is_empty());

    // shutdown 이후 새로 얻은 핸들은 이전 핸들 해제의 영향을 받지 않음
    let fresh = registry.acquire(sym("BTCUSDT"));
    drop(btc);
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 1);
    assert_eq!(fresh.symbol().as_str(), "BTCUSDT");
}

#[tokio::test(start_paused = true)]
async fn test_acquire_resubscribes_failed_synchronizer() {
    let (registry, source, transport) = registry();
    source.fail("BTCUSDT", ExchangeError::Timeout("10s".into()));

    let ticker_panel = registry.acquire(sym("BTCUSDT"));
    let mut panel_rx = ticker_panel.feed();
    tokio::time::timeout(Duration::from_secs(10), panel_rx.wait_for(|f| f.is_failed()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transport.connect_count(), 0);

    // 나중에 들어온 소비자가 실패한 피드를 물려받지 않음
    source.clear_failure("BTCUSDT");
    let order_book = registry.acquire(sym("BTCUSDT"));
    let mut rx = order_book.feed();
    let feed = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|f| f.view.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert!(feed.error.is_none());
    assert_eq!(feed.view.unwrap().last_price, "50000.00");

    // 먼저 붙어 있던 소비자도 같은 피드로 회복
    tokio::time::timeout(Duration::from_secs(10), panel_rx.wait_for(|f| f.is_connected()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registry.consumer_count(&sym("BTCUSDT")), 2);
    assert_eq!(source.fetch_count("BTCUSDT"), 2);
    assert_eq!(transport.connect_count(), 1);

    // 정상 피드에 소비자가 더 붙어도 다시 받지 않음
    let _chart = registry.acquire(sym("BTCUSDT"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.fetch_count("BTCUSDT"), 2);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_reselect_retries_failed_symbol() {
    let (registry, source, transport) = registry();
    let mut page = MarketPage::new(registry.clone());

    transport.fail_connects(u32::MAX);
    let mut rx = page.switch_symbol(sym("ETHUSDT"));
    let feed = tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|f| f.is_failed()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert!(feed.view.is_some());
    let attempts = transport.connect_count();
    let fetches = source.fetch_count("ETHUSDT");

    transport.fail_connects(0);
    let mut rx = page.switch_symbol(sym("ETHUSDT"));
    let feed = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|f| f.is_connected()))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert!(feed.error.is_none());
    assert_eq!(transport.connect_count(), attempts + 1);
    assert_eq!(source.fetch_count("ETHUSDT"), fetches + 1);
    assert_eq!(registry.consumer_count(&sym("ETHUSDT")), 1);
}
