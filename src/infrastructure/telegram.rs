//! Outbound notifications.
//!
//! [`TracingNotifier`] writes every event to the log and is the default.
//! [`TelegramNotifier`] mirrors events to a Telegram chat via the Bot API.
//! Notification delivery is fire-and-forget: a dead chat never blocks or
//! fails the trading pipeline.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::repositories::notifier::{Notifier, NotifyEvent};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Log-only notifier used when no chat integration is configured.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: NotifyEvent) {
        info!("{}", render_event(&event));
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn send(&self, text: &str) -> Result<(), reqwest::Error> {
        let url = format!(
            "{}/bot{}/sendMessage",
            TELEGRAM_API_BASE, self.config.bot_token
        );
        self.client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &self.config.chat_id,
                text,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: NotifyEvent) {
        let text = render_event(&event);
        if let Err(e) = self.send(&text).await {
            warn!("Telegram notification failed: {}", e);
        }
    }
}

fn render_event(event: &NotifyEvent) -> String {
    match event {
        NotifyEvent::SignalReceived { parsed, source } => format!(
            "Signal received ({}): {} {} @ {} (confidence {:.0}%)",
            source.name(),
            parsed.symbol,
            parsed.action,
            parsed.entry,
            parsed.confidence * 100.0
        ),
        NotifyEvent::TradeExecuted { trade } => format!(
            "Trade executed: {} {} x{} @ {} on {} [SL {}, TP {}]",
            trade.side,
            trade.symbol,
            trade.quantity,
            trade.entry_price,
            trade.exchange,
            trade
                .stop_loss
                .map_or_else(|| "none".to_string(), |p| p.to_string()),
            trade
                .take_profit
                .map_or_else(|| "none".to_string(), |p| p.to_string()),
        ),
        NotifyEvent::SimulatedTrade { parsed } => format!(
            "SIMULATION: would open {} {} @ {}",
            parsed.action, parsed.symbol, parsed.entry
        ),
        NotifyEvent::LowConfidence { parsed, threshold } => format!(
            "Skipped {} {}: confidence {:.0}% below threshold {:.0}%",
            parsed.action,
            parsed.symbol,
            parsed.confidence * 100.0,
            threshold * 100.0
        ),
        NotifyEvent::Error { context, message } => {
            format!("Error [{}]: {}", context, message)
        }
    }
}
