//! Exchange Client Trait
//!
//! Common capability interface for the two brokerage venues. Wire-level
//! concerns (signing, REST semantics, connection management) live behind
//! implementations of this trait; the executor only sees normalized order
//! results or an `ExchangeError`.

use async_trait::async_trait;

use crate::domain::entities::trade::OrderSide;
use crate::domain::errors::ExchangeError;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Normalized result of an order placement.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: String,
    pub status: String,
    /// Quantity actually filled, when the venue reports it.
    pub executed_qty: Option<f64>,
    /// Average fill price, when the venue reports it.
    pub avg_price: Option<f64>,
}

/// Venue-side view of an open position.
#[derive(Debug, Clone)]
pub struct VenuePosition {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Venue name for logs and error messages.
    fn name(&self) -> &str;

    /// Place a market entry order.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> ExchangeResult<OrderResult>;

    /// Place a protective stop order at `price`.
    async fn place_stop_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderResult>;

    /// Place a protective take-profit order at `price`.
    async fn place_take_profit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderResult>;

    /// Query the venue's view of a position, if one exists.
    async fn get_position(&self, symbol: &str) -> ExchangeResult<Option<VenuePosition>>;

    /// Close a position at market.
    async fn close_position(&self, symbol: &str) -> ExchangeResult<Option<OrderResult>>;
}
