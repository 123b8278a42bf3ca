use base64::Engine as _;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradewire::application::processor::SignalProcessor;
use tradewire::application::queue::{EnqueueOutcome, SignalQueue};
use tradewire::config::AppConfig;
use tradewire::domain::entities::exchange::Exchange;
use tradewire::domain::entities::signal::{RawSignal, SignalSource, SignalStatus};
use tradewire::domain::repositories::exchange_client::ExchangeClient;
use tradewire::domain::repositories::image_extractor::ImageExtractor;
use tradewire::domain::repositories::notifier::Notifier;
use tradewire::domain::repositories::stores::{SignalStore, TradeStore};
use tradewire::domain::services::position_manager::PositionManager;
use tradewire::domain::services::trade_executor::TradeExecutor;
use tradewire::infrastructure::paper_exchange::PaperExchange;
use tradewire::infrastructure::telegram::{TelegramConfig, TelegramNotifier, TracingNotifier};
use tradewire::infrastructure::vision::{GeminiConfig, GeminiExtractor};
use tradewire::persistence::repository::{
    SqlitePositionStore, SqliteSignalStore, SqliteTradeStore,
};
use tradewire::rate_limit::{create_rate_limiter, rate_limit_middleware, RateLimiterConfig};

struct AppState {
    queue: Arc<SignalQueue>,
    processor: Arc<SignalProcessor>,
    signal_store: Arc<dyn SignalStore>,
    trade_store: Arc<dyn TradeStore>,
    position_manager: Arc<PositionManager>,
    simulation_mode: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradewire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        "TradeWire starting (simulation={}, threshold={:.2})",
        config.simulation_mode, config.confidence_threshold
    );

    let pool = tradewire::persistence::init_database(&config.database_url).await?;
    let signal_store: Arc<dyn SignalStore> = Arc::new(SqliteSignalStore::new(pool.clone()));
    let trade_store: Arc<dyn TradeStore> = Arc::new(SqliteTradeStore::new(pool.clone()));
    let position_store = Arc::new(SqlitePositionStore::new(pool));

    let position_manager = Arc::new(PositionManager::new(position_store));
    let restored = position_manager.sync_from_database().await?;
    info!("Restored {} open positions", restored);

    let notifier: Arc<dyn Notifier> = match (&config.telegram_bot_token, &config.telegram_chat_id)
    {
        (Some(bot_token), Some(chat_id)) => {
            info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(TelegramConfig {
                bot_token: bot_token.clone(),
                chat_id: chat_id.clone(),
            }))
        }
        _ => Arc::new(TracingNotifier),
    };

    let mut clients: HashMap<Exchange, Arc<dyn ExchangeClient>> = HashMap::new();
    clients.insert(Exchange::Binance, Arc::new(PaperExchange::new("paper-binance")));
    clients.insert(Exchange::Ibkr, Arc::new(PaperExchange::new("paper-ibkr")));

    let executor = Arc::new(TradeExecutor::new(
        config.executor_config(),
        clients,
        position_manager.clone(),
        trade_store.clone(),
        notifier,
    ));

    let image_extractor: Option<Arc<dyn ImageExtractor>> = match &config.gemini_api_key {
        Some(key) => match GeminiExtractor::new(GeminiConfig::new(key)) {
            Ok(extractor) => {
                info!("Vision extraction enabled");
                Some(Arc::new(extractor))
            }
            Err(e) => {
                warn!("Vision extraction disabled: {}", e);
                None
            }
        },
        None => {
            info!("No GEMINI_API_KEY, image signals will rely on text only");
            None
        }
    };

    let processor = Arc::new(SignalProcessor::new(
        signal_store.clone(),
        image_extractor,
        Some(executor),
        config.confidence_threshold,
    ));

    let (queue, queue_worker) = SignalQueue::start(processor.clone(), config.queue.clone());

    let state = Arc::new(AppState {
        queue,
        processor,
        signal_store,
        trade_store,
        position_manager,
        simulation_mode: config.simulation_mode,
    });

    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute: config.http_requests_per_minute,
    });
    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/signals", post(ingest_signal).get(list_signals))
        .route("/positions", get(list_positions))
        .route("/trades", get(list_trades))
        .route("/control/pause", post(pause_processing))
        .route("/control/resume", post(resume_processing))
        .route("/control/threshold", post(set_threshold))
        .layer(middleware::from_fn(move |request, next| {
            rate_limit_middleware(limiter.clone(), request, next)
        }))
        .layer(RequestBodyLimitLayer::new(8 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = config.bind_addr();
    info!("Control API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    // Dropping the state drops the last queue handle, letting the worker
    // drain buffered jobs and exit.
    drop(state);
    queue_worker.await?;
    info!("Shutdown complete");
    Ok(())
}

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_base64: Option<String>,
    #[serde(default)]
    image_mime_type: Option<String>,
    #[serde(default)]
    source: Option<String>,
    channel_id: String,
    user_id: String,
    message_id: String,
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": context })),
    )
}

async fn ingest_signal(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<serde_json::Value>)> {
    let content = request.content.unwrap_or_default();
    let has_image = request
        .image_base64
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    if content.trim().is_empty() && !has_image {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "signal needs text content or an image" })),
        ));
    }
    if has_image {
        // Reject malformed payloads here instead of burning a vision call.
        if let Some(image) = request.image_base64.as_deref() {
            if base64::engine::general_purpose::STANDARD.decode(image).is_err() {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "image_base64 is not valid base64" })),
                ));
            }
        }
    }

    let source = request
        .source
        .as_deref()
        .and_then(SignalSource::from_name)
        .unwrap_or(if has_image {
            SignalSource::Image
        } else {
            SignalSource::Text
        });

    let raw = RawSignal::new(
        source,
        content,
        request.image_base64,
        request.image_mime_type,
        request.channel_id,
        request.user_id,
        request.message_id,
    );

    // Fast-fail on content already processed in an earlier run; the queue's
    // own dedup window only spans the current process.
    let already_stored = state
        .signal_store
        .exists(&raw.hash)
        .await
        .map_err(|e| internal_error("dedup lookup failed", e))?;
    if already_stored {
        return Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "hash": raw.hash, "status": "duplicate" })),
        ));
    }

    let hash = raw.hash.clone();
    let id = raw.id.clone();
    match state
        .queue
        .enqueue(raw)
        .await
        .map_err(|e| internal_error("enqueue failed", e))?
    {
        EnqueueOutcome::Queued => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "id": id, "hash": hash, "status": "queued" })),
        )),
        EnqueueOutcome::Duplicate => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "hash": hash, "status": "duplicate" })),
        )),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "paused": state.processor.is_paused(),
        "simulation_mode": state.simulation_mode,
    }))
}

async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let queue = state.queue.stats().await;
    let mut signals = serde_json::Map::new();
    for status in [
        SignalStatus::Executed,
        SignalStatus::Skipped,
        SignalStatus::Failed,
    ] {
        let count = state
            .signal_store
            .count_by_status(status)
            .await
            .map_err(|e| internal_error("signal counts failed", e))?;
        signals.insert(status.name().to_string(), serde_json::json!(count));
    }

    Ok(Json(serde_json::json!({
        "paused": state.processor.is_paused(),
        "confidence_threshold": state.processor.confidence_threshold().await,
        "simulation_mode": state.simulation_mode,
        "open_positions": state.position_manager.open_position_count().await,
        "queue": queue,
        "signals": signals,
    })))
}

async fn list_signals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let signals = state
        .signal_store
        .find_recent(50)
        .await
        .map_err(|e| internal_error("signal listing failed", e))?;
    Ok(Json(serde_json::json!({ "signals": signals })))
}

async fn list_positions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let positions = state.position_manager.all_open_positions().await;
    Json(serde_json::json!({ "positions": positions }))
}

async fn list_trades(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let trades = state
        .trade_store
        .find_recent(50)
        .await
        .map_err(|e| internal_error("trade listing failed", e))?;
    Ok(Json(serde_json::json!({ "trades": trades })))
}

async fn pause_processing(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.processor.pause();
    Json(serde_json::json!({ "paused": true }))
}

async fn resume_processing(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.processor.resume();
    Json(serde_json::json!({ "paused": false }))
}

#[derive(Deserialize)]
struct ThresholdRequest {
    value: f64,
}

async fn set_threshold(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ThresholdRequest>,
) -> Json<serde_json::Value> {
    let applied = state
        .processor
        .set_confidence_threshold(request.value)
        .await;
    Json(serde_json::json!({ "confidence_threshold": applied }))
}
