//! PositionManager service
//!
//! Authoritative in-memory cache of open positions backed by the durable
//! store, keyed by `SYMBOL_SIDE`. The cache is rehydrated from storage on
//! startup and is the single writer thereafter.
//!
//! No-pyramiding is enforced with a pending-open marker set: the key is
//! reserved before the durable create runs and released afterwards whether
//! or not the create succeeded. Two near-simultaneous opens for the same
//! (symbol, side) therefore cannot both pass the open-check, even though the
//! store write awaits in between.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::position::{position_key, Position, PositionSide, PositionUpdate};
use crate::domain::errors::StoreError;
use crate::domain::repositories::stores::PositionStore;

#[derive(Default)]
struct CacheState {
    open: HashMap<String, Position>,
    /// Keys with a durable create in flight.
    pending: HashSet<String>,
}

pub struct PositionManager {
    store: Arc<dyn PositionStore>,
    state: tokio::sync::Mutex<CacheState>,
}

impl PositionManager {
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self {
            store,
            state: tokio::sync::Mutex::new(CacheState::default()),
        }
    }

    /// Rebuild the cache from all open positions in durable storage.
    pub async fn sync_from_database(&self) -> Result<usize, StoreError> {
        info!("Syncing positions from database");
        let positions = self.store.find_all_open().await?;
        let mut state = self.state.lock().await;
        state.open.clear();
        for position in positions {
            state.open.insert(position.cache_key(), position);
        }
        let count = state.open.len();
        info!("Positions synced: {}", count);
        Ok(count)
    }

    /// True iff no open position exists for (symbol, side) and no open is in
    /// flight for that key.
    pub async fn can_open_position(&self, symbol: &str, side: PositionSide) -> bool {
        let key = position_key(symbol, side);
        let state = self.state.lock().await;
        let occupied = state.open.contains_key(&key) || state.pending.contains(&key);
        if occupied {
            debug!("Position slot occupied for {} {}", symbol, side);
        }
        !occupied
    }

    /// Attempt to open a position. Returns `Ok(None)` if the slot is already
    /// taken, whether by an open position or an open in progress; the caller
    /// cannot distinguish the two, both mean "do not open".
    pub async fn try_open_position(
        &self,
        position: Position,
    ) -> Result<Option<Position>, StoreError> {
        let key = position.cache_key();

        {
            let mut state = self.state.lock().await;
            if state.open.contains_key(&key) || state.pending.contains(&key) {
                debug!("Position already open or opening: {}", key);
                return Ok(None);
            }
            // Reserve the key before the store write; released below in
            // every exit path.
            state.pending.insert(key.clone());
        }

        let created = self.store.create(&position).await;

        let mut state = self.state.lock().await;
        state.pending.remove(&key);

        match created {
            Ok(()) => {
                info!(
                    "Position opened: {} {} {} qty {} @ {}",
                    position.id, position.symbol, position.side, position.quantity,
                    position.entry_price
                );
                state.open.insert(key, position.clone());
                Ok(Some(position))
            }
            Err(e) => Err(e),
        }
    }

    /// Open a position, raising an error if the slot is occupied.
    pub async fn open_position(&self, position: Position) -> Result<Position, StoreError> {
        let symbol = position.symbol.clone();
        let side = position.side;
        match self.try_open_position(position).await? {
            Some(opened) => Ok(opened),
            None => Err(StoreError::QueryFailed(format!(
                "Position already exists for {} {}",
                symbol, side
            ))),
        }
    }

    /// Apply price/PnL updates to an open position. Absent key is an
    /// idempotent no-op.
    pub async fn update_position(
        &self,
        symbol: &str,
        side: PositionSide,
        update: PositionUpdate,
    ) -> Result<Option<Position>, StoreError> {
        let key = position_key(symbol, side);
        let id = {
            let state = self.state.lock().await;
            match state.open.get(&key) {
                Some(position) => position.id.clone(),
                None => {
                    warn!("Position not found for update: {} {}", symbol, side);
                    return Ok(None);
                }
            }
        };

        self.store.update(&id, &update).await?;

        let mut state = self.state.lock().await;
        let updated = state.open.get_mut(&key).map(|position| {
            if let Some(price) = update.current_price {
                position.current_price = Some(price);
            }
            if let Some(pnl) = update.unrealized_pnl {
                position.unrealized_pnl = Some(pnl);
            }
            position.clone()
        });
        Ok(updated)
    }

    /// Close an open position. Absent key is an idempotent no-op.
    pub async fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
    ) -> Result<Option<Position>, StoreError> {
        let key = position_key(symbol, side);
        let id = {
            let state = self.state.lock().await;
            match state.open.get(&key) {
                Some(position) => position.id.clone(),
                None => {
                    warn!("Position not found for closing: {} {}", symbol, side);
                    return Ok(None);
                }
            }
        };

        let closed = self.store.close(&id).await?;

        let mut state = self.state.lock().await;
        state.open.remove(&key);
        info!("Position closed: {} {} {}", closed.id, symbol, side);
        Ok(Some(closed))
    }

    /// Cache-only read; never touches durable storage.
    pub async fn get_position(&self, symbol: &str, side: PositionSide) -> Option<Position> {
        let key = position_key(symbol, side);
        self.state.lock().await.open.get(&key).cloned()
    }

    /// Cache-only read of all open positions.
    pub async fn all_open_positions(&self) -> Vec<Position> {
        self.state.lock().await.open.values().cloned().collect()
    }

    /// Cache-only open-position count.
    pub async fn open_position_count(&self) -> usize {
        self.state.lock().await.open.len()
    }
}
