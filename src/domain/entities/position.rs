//! Position entity
//!
//! At most one open position may exist per (symbol, side) pair; the
//! position manager enforces that invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::exchange::{Exchange, Market};
use crate::domain::entities::signal::SignalAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl PositionSide {
    pub fn name(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }

    pub fn from_name(name: &str) -> Option<PositionSide> {
        match name {
            "LONG" => Some(PositionSide::Long),
            "SHORT" => Some(PositionSide::Short),
            _ => None,
        }
    }
}

impl From<SignalAction> for PositionSide {
    fn from(action: SignalAction) -> PositionSide {
        match action {
            SignalAction::Long => PositionSide::Long,
            SignalAction::Short => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }

    pub fn from_name(name: &str) -> Option<PositionStatus> {
        match name {
            "open" => Some(PositionStatus::Open),
            "closed" => Some(PositionStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub trade_id: String,
    pub exchange: Exchange,
    pub market: Market,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: f64,
    pub unrealized_pnl: Option<f64>,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Unrealized P&L against the latest known price, if any.
    pub fn compute_pnl(&self) -> Option<f64> {
        let current = self.current_price?;
        let delta = match self.side {
            PositionSide::Long => current - self.entry_price,
            PositionSide::Short => self.entry_price - current,
        };
        Some(delta * self.quantity)
    }

    /// Cache key used by the position manager: `SYMBOL_SIDE`, uppercased.
    pub fn cache_key(&self) -> String {
        position_key(&self.symbol, self.side)
    }
}

pub fn position_key(symbol: &str, side: PositionSide) -> String {
    format!("{}_{}", symbol.to_uppercase(), side.name())
}

/// Mutable fields of an open position.
#[derive(Debug, Clone, Default)]
pub struct PositionUpdate {
    pub current_price: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: PositionSide, entry: f64, current: Option<f64>) -> Position {
        Position {
            id: "p1".to_string(),
            trade_id: "t1".to_string(),
            exchange: Exchange::Binance,
            market: Market::Futures,
            symbol: "BTCUSDT".to_string(),
            side,
            quantity: 2.0,
            entry_price: entry,
            current_price: current,
            stop_loss: None,
            take_profit: None,
            leverage: 1.0,
            unrealized_pnl: None,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_pnl_long() {
        let p = position(PositionSide::Long, 100.0, Some(110.0));
        assert_eq!(p.compute_pnl(), Some(20.0));
    }

    #[test]
    fn test_pnl_short() {
        let p = position(PositionSide::Short, 100.0, Some(90.0));
        assert_eq!(p.compute_pnl(), Some(20.0));
    }

    #[test]
    fn test_pnl_without_price() {
        let p = position(PositionSide::Long, 100.0, None);
        assert_eq!(p.compute_pnl(), None);
    }

    #[test]
    fn test_position_key_uppercases() {
        assert_eq!(position_key("btcusdt", PositionSide::Long), "BTCUSDT_LONG");
        assert_eq!(position_key("AAPL", PositionSide::Short), "AAPL_SHORT");
    }
}
