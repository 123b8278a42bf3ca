//! Trade and order entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::exchange::{Exchange, Market};
use crate::domain::entities::signal::SignalAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl OrderSide {
    pub fn name(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn from_name(name: &str) -> Option<OrderSide> {
        match name {
            "BUY" => Some(OrderSide::Buy),
            "SELL" => Some(OrderSide::Sell),
            _ => None,
        }
    }

    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Entry-order side for a signal action; the closing side is the opposite.
    pub fn for_entry(action: SignalAction) -> OrderSide {
        match action {
            SignalAction::Long => OrderSide::Buy,
            SignalAction::Short => OrderSide::Sell,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Open,
    Cancelled,
    Failed,
    Closed,
}

impl TradeStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Open => "open",
            TradeStatus::Cancelled => "cancelled",
            TradeStatus::Failed => "failed",
            TradeStatus::Closed => "closed",
        }
    }

    pub fn from_name(name: &str) -> Option<TradeStatus> {
        match name {
            "pending" => Some(TradeStatus::Pending),
            "open" => Some(TradeStatus::Open),
            "cancelled" => Some(TradeStatus::Cancelled),
            "failed" => Some(TradeStatus::Failed),
            "closed" => Some(TradeStatus::Closed),
            _ => None,
        }
    }
}

/// One order placed at a venue as part of a trade. The orders list on a
/// trade is append-only while the trade is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    pub order_id: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub quantity: f64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One executed signal: the entry order plus any protective orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub signal_id: String,
    pub exchange: Exchange,
    pub market: Market,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: f64,
    pub status: TradeStatus,
    pub orders: Vec<OrderInfo>,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_for_entry() {
        assert_eq!(OrderSide::for_entry(SignalAction::Long), OrderSide::Buy);
        assert_eq!(OrderSide::for_entry(SignalAction::Short), OrderSide::Sell);
    }

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_trade_status_names() {
        assert_eq!(TradeStatus::Open.name(), "open");
        assert_eq!(TradeStatus::from_name("closed"), Some(TradeStatus::Closed));
        assert_eq!(TradeStatus::from_name("bogus"), None);
    }
}
