//! Repository traits over the durable entities.
//!
//! The pipeline depends on these interfaces only; the SQLite implementations
//! live in the persistence layer, and tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::domain::entities::position::{Position, PositionUpdate};
use crate::domain::entities::signal::{ParsedSignal, RawSignal, Signal, SignalStatus};
use crate::domain::entities::trade::Trade;
use crate::domain::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Persist a raw signal as a new pending signal.
    async fn create(&self, raw: &RawSignal) -> StoreResult<Signal>;

    /// Hash lookup, the durable dedup gate.
    async fn find_by_hash(&self, hash: &str) -> StoreResult<Option<Signal>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Signal>>;

    /// Fast-fail existence check for the ingest path.
    async fn exists(&self, hash: &str) -> StoreResult<bool>;

    /// Move a signal to a terminal or intermediate status, stamping
    /// `processed_at` and the optional human-readable reason.
    async fn update_status(
        &self,
        id: &str,
        status: SignalStatus,
        reason: Option<&str>,
    ) -> StoreResult<()>;

    /// Attach the merged parse result and advance the status.
    async fn update_parsed(
        &self,
        id: &str,
        parsed: &ParsedSignal,
        status: SignalStatus,
    ) -> StoreResult<Signal>;

    /// Most recent signals, newest first.
    async fn find_recent(&self, limit: i64) -> StoreResult<Vec<Signal>>;

    async fn count_by_status(&self, status: SignalStatus) -> StoreResult<i64>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn create(&self, trade: &Trade) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Trade>>;

    async fn find_by_signal(&self, signal_id: &str) -> StoreResult<Option<Trade>>;

    async fn find_recent(&self, limit: i64) -> StoreResult<Vec<Trade>>;

    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn create(&self, position: &Position) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Position>>;

    /// All positions with status = open, for cache rehydration on startup.
    async fn find_all_open(&self) -> StoreResult<Vec<Position>>;

    async fn update(&self, id: &str, update: &PositionUpdate) -> StoreResult<()>;

    /// Mark a position closed, stamping `closed_at`.
    async fn close(&self, id: &str) -> StoreResult<Position>;
}
