//! Signal Pipeline End-to-End Tests
//!
//! Exercises the full wiring: SQLite stores, position manager, executor,
//! processor and queue, driven the way the control API drives them. The
//! only substitutions are the vision extractor (stubbed, no network) and
//! the venues (paper exchanges).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use tradewire::application::processor::SignalProcessor;
use tradewire::application::queue::{EnqueueOutcome, QueueConfig, QueueEvent, SignalQueue};
use tradewire::domain::entities::exchange::Exchange;
use tradewire::domain::entities::signal::{
    ParsedSignal, RawSignal, Signal, SignalAction, SignalSource, SignalStatus,
};
use tradewire::domain::errors::{ExecutionError, VisionError};
use tradewire::domain::repositories::exchange_client::ExchangeClient;
use tradewire::domain::repositories::executor::SignalExecutor;
use tradewire::domain::repositories::image_extractor::ImageExtractor;
use tradewire::domain::repositories::notifier::Notifier;
use tradewire::domain::repositories::stores::{PositionStore, SignalStore, TradeStore};
use tradewire::domain::services::position_manager::PositionManager;
use tradewire::domain::services::trade_executor::{ExecutorConfig, TradeExecutor};
use tradewire::infrastructure::paper_exchange::PaperExchange;
use tradewire::infrastructure::telegram::TracingNotifier;
use tradewire::persistence::repository::{
    SqlitePositionStore, SqliteSignalStore, SqliteTradeStore,
};

struct Pipeline {
    queue: Arc<SignalQueue>,
    events: broadcast::Receiver<QueueEvent>,
    signal_store: Arc<dyn SignalStore>,
    trade_store: Arc<dyn TradeStore>,
    position_manager: Arc<PositionManager>,
    executor: Arc<TradeExecutor>,
}

struct StubExtractor {
    result: Option<ParsedSignal>,
}

#[async_trait]
impl ImageExtractor for StubExtractor {
    async fn extract(
        &self,
        _image_base64: &str,
        _mime_type: &str,
    ) -> Result<Option<ParsedSignal>, VisionError> {
        Ok(self.result.clone())
    }
}

async fn build_pipeline(
    simulation: bool,
    confidence_threshold: f64,
    extractor: Option<Arc<dyn ImageExtractor>>,
) -> Pipeline {
    let db_path = std::env::temp_dir().join(format!("tradewire-e2e-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", db_path.display());
    let pool = tradewire::persistence::init_database(&url)
        .await
        .expect("database init");

    let signal_store: Arc<dyn SignalStore> = Arc::new(SqliteSignalStore::new(pool.clone()));
    let trade_store: Arc<dyn TradeStore> = Arc::new(SqliteTradeStore::new(pool.clone()));
    let position_store: Arc<dyn PositionStore> = Arc::new(SqlitePositionStore::new(pool));

    let position_manager = Arc::new(PositionManager::new(position_store));
    position_manager.sync_from_database().await.expect("sync");

    let mut clients: HashMap<Exchange, Arc<dyn ExchangeClient>> = HashMap::new();
    clients.insert(
        Exchange::Binance,
        Arc::new(PaperExchange::new("paper-binance")),
    );
    clients.insert(Exchange::Ibkr, Arc::new(PaperExchange::new("paper-ibkr")));

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let executor = Arc::new(TradeExecutor::new(
        ExecutorConfig {
            simulation_mode: simulation,
            default_position_size: 100.0,
            default_leverage: 1.0,
            confidence_threshold,
        },
        clients,
        position_manager.clone(),
        trade_store.clone(),
        notifier,
    ));

    let processor = Arc::new(SignalProcessor::new(
        signal_store.clone(),
        extractor,
        Some(executor.clone()),
        confidence_threshold,
    ));

    let config = QueueConfig {
        backoff_base: Duration::from_millis(1),
        rate_limit_jobs: 1000,
        rate_limit_window: Duration::from_secs(1),
        ..QueueConfig::default()
    };
    let (queue, _worker) = SignalQueue::start(processor, config);
    let events = queue.subscribe();

    Pipeline {
        queue,
        events,
        signal_store,
        trade_store,
        position_manager,
        executor,
    }
}

fn text_signal(content: &str, message_id: &str) -> RawSignal {
    RawSignal::new(
        SignalSource::Text,
        content.to_string(),
        None,
        None,
        "channel-1".to_string(),
        "trader-1".to_string(),
        message_id.to_string(),
    )
}

async fn wait_done(events: &mut broadcast::Receiver<QueueEvent>) -> QueueEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("queue event within timeout")
            .expect("event channel open");
        if matches!(event, QueueEvent::Completed { .. } | QueueEvent::Failed { .. }) {
            return event;
        }
    }
}

async fn stored_signal(store: &Arc<dyn SignalStore>, hash: &str) -> Signal {
    store
        .find_by_hash(hash)
        .await
        .expect("store lookup")
        .expect("signal stored")
}

#[tokio::test]
async fn full_text_signal_executes_in_simulation() {
    let mut p = build_pipeline(true, 0.7, None).await;

    let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    let hash = raw.hash.clone();
    assert_eq!(p.queue.enqueue(raw).await.unwrap(), EnqueueOutcome::Queued);
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Executed);
    let parsed = signal.parsed.expect("parsed stored");
    assert_eq!(parsed.symbol, "BTC");
    assert_eq!(parsed.action, SignalAction::Long);
    assert_eq!(parsed.entry, 45000.0);
    assert_eq!(parsed.confidence, 1.0);

    // Simulation leaves no trades or positions behind.
    assert_eq!(p.trade_store.count().await.unwrap(), 0);
    assert_eq!(p.position_manager.open_position_count().await, 0);
}

#[tokio::test]
async fn repeated_content_is_processed_once() {
    let mut p = build_pipeline(true, 0.7, None).await;

    let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    let hash = raw.hash.clone();
    let again = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    assert_eq!(again.hash, hash);

    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;
    assert_eq!(
        p.queue.enqueue(again).await.unwrap(),
        EnqueueOutcome::Duplicate
    );

    // Same content under a different message id is a different signal.
    let other = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-2");
    assert_ne!(other.hash, hash);
}

#[tokio::test]
async fn low_confidence_signal_is_skipped_with_reason() {
    let mut p = build_pipeline(true, 0.7, None).await;

    // Simple-format parse without stop or target: 0.3 + 0.2 + 0.15 = 0.65.
    let raw = text_signal("BTC 45000 LONG", "msg-1");
    let hash = raw.hash.clone();
    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Skipped);
    assert_eq!(
        signal.status_reason.as_deref(),
        Some("Confidence 65% below threshold 70%")
    );
}

#[tokio::test]
async fn unparseable_message_is_marked_failed() {
    let mut p = build_pipeline(true, 0.7, None).await;

    let raw = text_signal("gm, market looks spicy today", "msg-1");
    let hash = raw.hash.clone();
    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Failed);
    assert_eq!(
        signal.status_reason.as_deref(),
        Some("Failed to parse signal content")
    );
}

#[tokio::test]
async fn image_extraction_wins_the_merge() {
    let extractor: Arc<dyn ImageExtractor> = Arc::new(StubExtractor {
        result: Some(ParsedSignal {
            symbol: "ETH".to_string(),
            action: SignalAction::Long,
            entry: 3000.0,
            stop_loss: None,
            take_profit: None,
            leverage: None,
            confidence: 0.9,
            exchange: None,
            market: None,
        }),
    });
    let mut p = build_pipeline(true, 0.7, Some(extractor)).await;

    let mut raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    raw.image_base64 = Some("aGVsbG8=".to_string());
    let hash = raw.hash.clone();
    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Executed);
    let parsed = signal.parsed.expect("parsed stored");
    // Image wins the identity fields, text fills the gaps, confidence is max.
    assert_eq!(parsed.symbol, "ETH");
    assert_eq!(parsed.entry, 3000.0);
    assert_eq!(parsed.stop_loss, Some(44000.0));
    assert_eq!(parsed.take_profit, Some(47000.0));
    assert_eq!(parsed.confidence, 1.0);
}

#[tokio::test]
async fn live_execution_persists_trade_and_position() {
    let mut p = build_pipeline(false, 0.7, None).await;

    let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    let hash = raw.hash.clone();
    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Executed);

    let trade = p
        .trade_store
        .find_by_signal(signal.id())
        .await
        .unwrap()
        .expect("trade persisted");
    assert_eq!(trade.symbol, "BTCUSDT");
    assert_eq!(trade.exchange, Exchange::Binance);
    assert_eq!(p.position_manager.open_position_count().await, 1);
}

#[tokio::test]
async fn second_signal_for_same_slot_is_rejected() {
    let mut p = build_pipeline(false, 0.7, None).await;

    let first = text_signal("LONG BTC 45000 SL:44000 TP:47000", "msg-1");
    p.queue.enqueue(first).await.unwrap();
    wait_done(&mut p.events).await;

    let second = text_signal("LONG BTC 45100 SL:44100 TP:47100", "msg-2");
    let hash = second.hash.clone();
    p.queue.enqueue(second).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Failed);
    assert!(signal
        .status_reason
        .as_deref()
        .is_some_and(|r| r.contains("Position already exists")));
    assert_eq!(p.trade_store.count().await.unwrap(), 1);
    assert_eq!(p.position_manager.open_position_count().await, 1);
}

#[tokio::test]
async fn concurrent_executions_open_exactly_one_position() {
    let p = build_pipeline(false, 0.7, None).await;

    let parsed = ParsedSignal {
        symbol: "BTC".to_string(),
        action: SignalAction::Long,
        entry: 45000.0,
        stop_loss: Some(44000.0),
        take_profit: None,
        leverage: None,
        confidence: 0.95,
        exchange: None,
        market: None,
    };

    let mut handles = Vec::new();
    for i in 0..8 {
        let raw = text_signal("LONG BTC 45000 SL:44000", &format!("msg-{i}"));
        let signal = p.signal_store.create(&raw).await.expect("signal stored");
        let executor = p.executor.clone();
        let parsed = parsed.clone();
        handles.push(tokio::spawn(async move {
            executor.execute(&signal, &parsed).await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for result in futures_util::future::join_all(handles).await {
        match result.expect("task join") {
            Ok(()) => successes += 1,
            Err(ExecutionError::PositionAlreadyOpen { .. }) => rejections += 1,
            Err(e) => panic!("unexpected execution error: {e}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejections, 7);
    assert_eq!(p.position_manager.open_position_count().await, 1);
}

#[tokio::test]
async fn stock_symbol_routes_to_equities_venue() {
    let mut p = build_pipeline(false, 0.7, None).await;

    let raw = text_signal("LONG AAPL 10 SL:9 TP:12", "msg-1");
    let hash = raw.hash.clone();
    p.queue.enqueue(raw).await.unwrap();
    wait_done(&mut p.events).await;

    let signal = stored_signal(&p.signal_store, &hash).await;
    assert_eq!(signal.status, SignalStatus::Executed);
    let trade = p
        .trade_store
        .find_by_signal(signal.id())
        .await
        .unwrap()
        .expect("trade persisted");
    assert_eq!(trade.exchange, Exchange::Ibkr);
    assert_eq!(trade.symbol, "AAPL");
    // 100 / 10 = 10 whole shares.
    assert_eq!(trade.quantity, 10.0);
}
