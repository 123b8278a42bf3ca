//! Database Models
//!
//! Row structs for the signals, trades, and positions tables, plus the
//! conversions to and from domain entities. Enums travel as their `name()`
//! strings; nested structures travel as JSON text columns.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::entities::exchange::{Exchange, Market};
use crate::domain::entities::position::{Position, PositionSide, PositionStatus};
use crate::domain::entities::signal::{
    ParsedSignal, RawSignal, Signal, SignalSource, SignalStatus,
};
use crate::domain::entities::trade::{OrderInfo, OrderSide, Trade, TradeStatus};
use crate::domain::errors::StoreError;

fn bad_column(column: &str, value: &str) -> StoreError {
    StoreError::Serialization(format!("unexpected {} value: {}", column, value))
}

/// Signal row
#[derive(Debug, Clone, FromRow)]
pub struct SignalRecord {
    pub id: String,
    pub source: String,
    pub raw_content: String,
    pub image_base64: Option<String>,
    pub image_mime_type: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub message_id: String,
    pub hash: String,
    pub parsed: Option<String>,
    pub status: String,
    pub status_reason: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl SignalRecord {
    pub fn into_signal(self) -> Result<Signal, StoreError> {
        let source = SignalSource::from_name(&self.source)
            .ok_or_else(|| bad_column("source", &self.source))?;
        let status = SignalStatus::from_name(&self.status)
            .ok_or_else(|| bad_column("status", &self.status))?;
        let parsed: Option<ParsedSignal> = match self.parsed {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(Signal {
            raw: RawSignal {
                id: self.id,
                source,
                raw_content: self.raw_content,
                image_base64: self.image_base64,
                image_mime_type: self.image_mime_type,
                channel_id: self.channel_id,
                user_id: self.user_id,
                message_id: self.message_id,
                hash: self.hash,
                received_at: self.received_at,
            },
            parsed,
            status,
            status_reason: self.status_reason,
            processed_at: self.processed_at,
        })
    }
}

/// Trade row
#[derive(Debug, Clone, FromRow)]
pub struct TradeRecord {
    pub id: String,
    pub signal_id: String,
    pub exchange: String,
    pub market: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: f64,
    pub status: String,
    pub orders: String,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
}

impl TradeRecord {
    pub fn into_trade(self) -> Result<Trade, StoreError> {
        let exchange = Exchange::from_name(&self.exchange)
            .ok_or_else(|| bad_column("exchange", &self.exchange))?;
        let market =
            Market::from_name(&self.market).ok_or_else(|| bad_column("market", &self.market))?;
        let side =
            OrderSide::from_name(&self.side).ok_or_else(|| bad_column("side", &self.side))?;
        let status = TradeStatus::from_name(&self.status)
            .ok_or_else(|| bad_column("status", &self.status))?;
        let orders: Vec<OrderInfo> = serde_json::from_str(&self.orders)?;
        Ok(Trade {
            id: self.id,
            signal_id: self.signal_id,
            exchange,
            market,
            symbol: self.symbol,
            side,
            quantity: self.quantity,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            leverage: self.leverage,
            status,
            orders,
            pnl: self.pnl,
            pnl_percentage: self.pnl_percentage,
            created_at: self.created_at,
            closed_at: self.closed_at,
            close_reason: self.close_reason,
        })
    }
}

/// Position row
#[derive(Debug, Clone, FromRow)]
pub struct PositionRecord {
    pub id: String,
    pub trade_id: String,
    pub exchange: String,
    pub market: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: f64,
    pub unrealized_pnl: Option<f64>,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PositionRecord {
    pub fn into_position(self) -> Result<Position, StoreError> {
        let exchange = Exchange::from_name(&self.exchange)
            .ok_or_else(|| bad_column("exchange", &self.exchange))?;
        let market =
            Market::from_name(&self.market).ok_or_else(|| bad_column("market", &self.market))?;
        let side =
            PositionSide::from_name(&self.side).ok_or_else(|| bad_column("side", &self.side))?;
        let status = PositionStatus::from_name(&self.status)
            .ok_or_else(|| bad_column("status", &self.status))?;
        Ok(Position {
            id: self.id,
            trade_id: self.trade_id,
            exchange,
            market,
            symbol: self.symbol,
            side,
            quantity: self.quantity,
            entry_price: self.entry_price,
            current_price: self.current_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            leverage: self.leverage,
            unrealized_pnl: self.unrealized_pnl,
            status,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_record_round_trip() {
        let record = SignalRecord {
            id: "s1".to_string(),
            source: "text".to_string(),
            raw_content: "LONG BTC".to_string(),
            image_base64: None,
            image_mime_type: None,
            channel_id: "c".to_string(),
            user_id: "u".to_string(),
            message_id: "m".to_string(),
            hash: "abc".to_string(),
            parsed: Some(
                r#"{"symbol":"BTC","action":"LONG","entry":45000.0,"confidence":0.9}"#.to_string(),
            ),
            status: "parsed".to_string(),
            status_reason: None,
            received_at: Utc::now(),
            processed_at: None,
        };
        let signal = record.into_signal().unwrap();
        assert_eq!(signal.status, SignalStatus::Parsed);
        assert_eq!(signal.parsed.unwrap().symbol, "BTC");
    }

    #[test]
    fn test_unknown_status_is_a_serialization_error() {
        let record = PositionRecord {
            id: "p1".to_string(),
            trade_id: "t1".to_string(),
            exchange: "binance".to_string(),
            market: "futures".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: "LONG".to_string(),
            quantity: 1.0,
            entry_price: 45000.0,
            current_price: None,
            stop_loss: None,
            take_profit: None,
            leverage: 1.0,
            unrealized_pnl: None,
            status: "liquidated".to_string(),
            opened_at: Utc::now(),
            closed_at: None,
        };
        assert!(matches!(
            record.into_position(),
            Err(StoreError::Serialization(_))
        ));
    }
}
