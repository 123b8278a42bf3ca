//! Paper trading venue.
//!
//! In-memory [`ExchangeClient`] that fills every order instantly at the
//! requested price. Default venue wiring until real brokerage credentials
//! are configured, and the exchange double in pipeline tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::entities::trade::OrderSide;
use crate::domain::repositories::exchange_client::{
    ExchangeClient, ExchangeResult, OrderResult, VenuePosition,
};

pub struct PaperExchange {
    name: String,
    positions: Mutex<HashMap<String, VenuePosition>>,
    /// Reference prices for market fills; falls back to the order price.
    marks: Mutex<HashMap<String, f64>>,
    order_seq: AtomicU64,
}

impl PaperExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            positions: Mutex::new(HashMap::new()),
            marks: Mutex::new(HashMap::new()),
            order_seq: AtomicU64::new(1),
        }
    }

    /// Seed a reference price so market fills have a realistic level.
    pub async fn set_mark_price(&self, symbol: &str, price: f64) {
        self.marks.lock().await.insert(symbol.to_string(), price);
    }

    fn next_order_id(&self) -> String {
        format!("paper-{}", self.order_seq.fetch_add(1, Ordering::SeqCst))
    }

    fn filled(&self, quantity: f64, price: Option<f64>) -> OrderResult {
        OrderResult {
            order_id: self.next_order_id(),
            status: "FILLED".to_string(),
            executed_qty: Some(quantity),
            avg_price: price,
        }
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> ExchangeResult<OrderResult> {
        let mark = self.marks.lock().await.get(symbol).copied();
        let mut positions = self.positions.lock().await;
        let signed_quantity = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let position = positions
            .entry(symbol.to_string())
            .or_insert_with(|| VenuePosition {
                symbol: symbol.to_string(),
                quantity: 0.0,
                entry_price: mark.unwrap_or(0.0),
            });
        position.quantity += signed_quantity;
        if let Some(price) = mark {
            position.entry_price = price;
        }
        if position.quantity == 0.0 {
            positions.remove(symbol);
        }
        info!("Paper fill: {} {} x{} on {}", side, symbol, quantity, self.name);
        Ok(self.filled(quantity, mark))
    }

    async fn place_stop_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderResult> {
        info!(
            "Paper stop order: {} {} x{} @ {} on {}",
            side, symbol, quantity, price, self.name
        );
        Ok(OrderResult {
            order_id: self.next_order_id(),
            status: "NEW".to_string(),
            executed_qty: None,
            avg_price: None,
        })
    }

    async fn place_take_profit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderResult> {
        info!(
            "Paper take-profit order: {} {} x{} @ {} on {}",
            side, symbol, quantity, price, self.name
        );
        Ok(OrderResult {
            order_id: self.next_order_id(),
            status: "NEW".to_string(),
            executed_qty: None,
            avg_price: None,
        })
    }

    async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<VenuePosition>> {
        Ok(self.positions.lock().await.get(symbol).cloned())
    }

    async fn close_position(&self, symbol: &str) -> ExchangeResult<Option<OrderResult>> {
        let Some(position) = self.positions.lock().await.remove(symbol) else {
            return Ok(None);
        };
        info!("Paper close: {} x{} on {}", symbol, position.quantity, self.name);
        Ok(Some(self.filled(position.quantity.abs(), None)))
    }
}
