//! Database Repository
//!
//! SQLite implementations of the signal, trade, and position store traits.

use async_trait::async_trait;
use chrono::Utc;

use super::models::{PositionRecord, SignalRecord, TradeRecord};
use super::DbPool;
use crate::domain::entities::position::{Position, PositionUpdate};
use crate::domain::entities::signal::{ParsedSignal, RawSignal, Signal, SignalStatus};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::StoreError;
use crate::domain::repositories::stores::{
    PositionStore, SignalStore, StoreResult, TradeStore,
};

pub struct SqliteSignalStore {
    pool: DbPool,
}

impl SqliteSignalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &str) -> StoreResult<Signal> {
        let record = sqlx::query_as::<_, SignalRecord>("SELECT * FROM signals WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.into_signal()
    }
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    async fn create(&self, raw: &RawSignal) -> StoreResult<Signal> {
        let signal = Signal::pending(raw.clone());
        sqlx::query(
            r#"
            INSERT INTO signals (
                id, source, raw_content, image_base64, image_mime_type,
                channel_id, user_id, message_id, hash, parsed, status,
                status_reason, received_at, processed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, NULL, ?11, NULL)
            "#,
        )
        .bind(&raw.id)
        .bind(raw.source.name())
        .bind(&raw.raw_content)
        .bind(&raw.image_base64)
        .bind(&raw.image_mime_type)
        .bind(&raw.channel_id)
        .bind(&raw.user_id)
        .bind(&raw.message_id)
        .bind(&raw.hash)
        .bind(signal.status.name())
        .bind(raw.received_at)
        .execute(&self.pool)
        .await?;
        Ok(signal)
    }

    async fn find_by_hash(&self, hash: &str) -> StoreResult<Option<Signal>> {
        let record = sqlx::query_as::<_, SignalRecord>("SELECT * FROM signals WHERE hash = ?1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        record.map(SignalRecord::into_signal).transpose()
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Signal>> {
        let record = sqlx::query_as::<_, SignalRecord>("SELECT * FROM signals WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record.map(SignalRecord::into_signal).transpose()
    }

    async fn exists(&self, hash: &str) -> StoreResult<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM signals WHERE hash = ?1")
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    async fn update_status(
        &self,
        id: &str,
        status: SignalStatus,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE signals
            SET status = ?1, status_reason = ?2, processed_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(status.name())
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn update_parsed(
        &self,
        id: &str,
        parsed: &ParsedSignal,
        status: SignalStatus,
    ) -> StoreResult<Signal> {
        let parsed_json = serde_json::to_string(parsed)?;
        let rows = sqlx::query(
            r#"
            UPDATE signals
            SET parsed = ?1, status = ?2, processed_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(&parsed_json)
        .bind(status.name())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.fetch(id).await
    }

    async fn find_recent(&self, limit: i64) -> StoreResult<Vec<Signal>> {
        let records = sqlx::query_as::<_, SignalRecord>(
            "SELECT * FROM signals ORDER BY received_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        records
            .into_iter()
            .map(SignalRecord::into_signal)
            .collect()
    }

    async fn count_by_status(&self, status: SignalStatus) -> StoreResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM signals WHERE status = ?1")
            .bind(status.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

pub struct SqliteTradeStore {
    pool: DbPool,
}

impl SqliteTradeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn create(&self, trade: &Trade) -> StoreResult<()> {
        let orders_json = serde_json::to_string(&trade.orders)?;
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, signal_id, exchange, market, symbol, side, quantity,
                entry_price, stop_loss, take_profit, leverage, status,
                orders, pnl, pnl_percentage, created_at, closed_at, close_reason
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.signal_id)
        .bind(trade.exchange.name())
        .bind(trade.market.name())
        .bind(&trade.symbol)
        .bind(trade.side.name())
        .bind(trade.quantity)
        .bind(trade.entry_price)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .bind(trade.leverage)
        .bind(trade.status.name())
        .bind(&orders_json)
        .bind(trade.pnl)
        .bind(trade.pnl_percentage)
        .bind(trade.created_at)
        .bind(trade.closed_at)
        .bind(&trade.close_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Trade>> {
        let record = sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record.map(TradeRecord::into_trade).transpose()
    }

    async fn find_by_signal(&self, signal_id: &str) -> StoreResult<Option<Trade>> {
        let record =
            sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE signal_id = ?1")
                .bind(signal_id)
                .fetch_optional(&self.pool)
                .await?;
        record.map(TradeRecord::into_trade).transpose()
    }

    async fn find_recent(&self, limit: i64) -> StoreResult<Vec<Trade>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        records.into_iter().map(TradeRecord::into_trade).collect()
    }

    async fn count(&self) -> StoreResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

pub struct SqlitePositionStore {
    pool: DbPool,
}

impl SqlitePositionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionStore for SqlitePositionStore {
    async fn create(&self, position: &Position) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                id, trade_id, exchange, market, symbol, side, quantity,
                entry_price, current_price, stop_loss, take_profit, leverage,
                unrealized_pnl, status, opened_at, closed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&position.id)
        .bind(&position.trade_id)
        .bind(position.exchange.name())
        .bind(position.market.name())
        .bind(&position.symbol)
        .bind(position.side.name())
        .bind(position.quantity)
        .bind(position.entry_price)
        .bind(position.current_price)
        .bind(position.stop_loss)
        .bind(position.take_profit)
        .bind(position.leverage)
        .bind(position.unrealized_pnl)
        .bind(position.status.name())
        .bind(position.opened_at)
        .bind(position.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Position>> {
        let record = sqlx::query_as::<_, PositionRecord>("SELECT * FROM positions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        record.map(PositionRecord::into_position).transpose()
    }

    async fn find_all_open(&self) -> StoreResult<Vec<Position>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE status = 'open' ORDER BY opened_at",
        )
        .fetch_all(&self.pool)
        .await?;
        records
            .into_iter()
            .map(PositionRecord::into_position)
            .collect()
    }

    async fn update(&self, id: &str, update: &PositionUpdate) -> StoreResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE positions
            SET current_price = COALESCE(?1, current_price),
                unrealized_pnl = COALESCE(?2, unrealized_pnl)
            WHERE id = ?3
            "#,
        )
        .bind(update.current_price)
        .bind(update.unrealized_pnl)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn close(&self, id: &str) -> StoreResult<Position> {
        let rows = sqlx::query(
            r#"
            UPDATE positions
            SET status = 'closed', closed_at = ?1
            WHERE id = ?2 AND status = 'open'
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
