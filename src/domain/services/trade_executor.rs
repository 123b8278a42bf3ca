//! TradeExecutor service
//!
//! Takes a parsed, gate-passing signal through re-validation, routing, the
//! no-pyramiding check and order placement, then persists the trade and
//! opens the position. Protective-order failures are logged and swallowed;
//! the position is considered open on the entry fill alone. In simulation
//! mode nothing reaches a venue and no position slot is consumed.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::position::{Position, PositionSide, PositionStatus};
use crate::domain::entities::signal::{ParsedSignal, Signal};
use crate::domain::entities::trade::{OrderInfo, OrderSide, OrderType, Trade, TradeStatus};
use crate::domain::errors::{ExchangeError, ExecutionError, ValidationError};
use crate::domain::repositories::exchange_client::{ExchangeClient, OrderResult};
use crate::domain::repositories::executor::SignalExecutor;
use crate::domain::repositories::notifier::{Notifier, NotifyEvent};
use crate::domain::repositories::stores::TradeStore;
use crate::domain::services::position_manager::PositionManager;
use crate::domain::services::router::{route_signal, RouteDecision};
use crate::domain::services::validation::validate_parsed_signal;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Suppress all venue calls; simulated trades never occupy a position slot.
    pub simulation_mode: bool,
    /// Notional position size in quote currency.
    pub default_position_size: f64,
    pub default_leverage: f64,
    /// Defense-in-depth gate; the processor applies its own threshold first.
    pub confidence_threshold: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            simulation_mode: true,
            default_position_size: 100.0,
            default_leverage: 1.0,
            confidence_threshold: 0.7,
        }
    }
}

pub struct TradeExecutor {
    config: ExecutorConfig,
    clients: HashMap<Exchange, Arc<dyn ExchangeClient>>,
    position_manager: Arc<PositionManager>,
    trade_store: Arc<dyn TradeStore>,
    notifier: Arc<dyn Notifier>,
}

impl TradeExecutor {
    pub fn new(
        config: ExecutorConfig,
        clients: HashMap<Exchange, Arc<dyn ExchangeClient>>,
        position_manager: Arc<PositionManager>,
        trade_store: Arc<dyn TradeStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        info!(
            "Executor configured: simulation={} position_size={} leverage={} threshold={}",
            config.simulation_mode,
            config.default_position_size,
            config.default_leverage,
            config.confidence_threshold
        );
        Self {
            config,
            clients,
            position_manager,
            trade_store,
            notifier,
        }
    }

    fn client(&self, exchange: Exchange) -> Result<&Arc<dyn ExchangeClient>, ExecutionError> {
        self.clients.get(&exchange).ok_or_else(|| {
            ExecutionError::Exchange(ExchangeError::NotInitialized(exchange.name().to_string()))
        })
    }

    /// Notional / entry for futures; whole shares for equities.
    fn order_quantity(&self, route: &RouteDecision, parsed: &ParsedSignal, leverage: f64) -> f64 {
        match route.exchange {
            Exchange::Binance => self.config.default_position_size * leverage / parsed.entry,
            Exchange::Ibkr => (self.config.default_position_size / parsed.entry).floor(),
        }
    }

    async fn execute_live(
        &self,
        signal: &Signal,
        parsed: &ParsedSignal,
        route: &RouteDecision,
    ) -> Result<Trade, ExecutionError> {
        let client = self.client(route.exchange)?;

        let leverage = match route.exchange {
            Exchange::Binance => parsed.leverage.unwrap_or(self.config.default_leverage),
            Exchange::Ibkr => 1.0,
        };
        let quantity = self.order_quantity(route, parsed, leverage);
        if quantity <= 0.0 {
            return Err(ExecutionError::Validation(ValidationError::InvalidQuantity(
                quantity,
            )));
        }

        let side = OrderSide::for_entry(parsed.action);
        let closing_side = side.opposite();
        let mut orders: Vec<OrderInfo> = Vec::new();

        info!(
            "Executing {} trade: {} {} qty {} lev {}",
            route.exchange, route.symbol, side, quantity, leverage
        );

        let entry_order = client
            .place_market_order(&route.symbol, side, quantity)
            .await?;
        orders.push(order_info(&entry_order, OrderType::Market, side, None, quantity));

        if let Some(stop_loss) = parsed.stop_loss {
            match client
                .place_stop_order(&route.symbol, closing_side, quantity, stop_loss)
                .await
            {
                Ok(order) => orders.push(order_info(
                    &order,
                    OrderType::StopLoss,
                    closing_side,
                    Some(stop_loss),
                    quantity,
                )),
                // Best effort: the trade stays open on the entry fill alone.
                Err(e) => error!("Failed to place stop loss: {}", e),
            }
        }

        if let Some(take_profit) = parsed.take_profit {
            match client
                .place_take_profit_order(&route.symbol, closing_side, quantity, take_profit)
                .await
            {
                Ok(order) => orders.push(order_info(
                    &order,
                    OrderType::TakeProfit,
                    closing_side,
                    Some(take_profit),
                    quantity,
                )),
                Err(e) => error!("Failed to place take profit: {}", e),
            }
        }

        let entry_price = entry_order.avg_price.unwrap_or(parsed.entry);
        let filled_quantity = entry_order.executed_qty.unwrap_or(quantity);

        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            signal_id: signal.id().to_string(),
            exchange: route.exchange,
            market: route.market,
            symbol: route.symbol.clone(),
            side,
            quantity: filled_quantity,
            entry_price,
            stop_loss: parsed.stop_loss,
            take_profit: parsed.take_profit,
            leverage,
            status: TradeStatus::Open,
            orders,
            pnl: None,
            pnl_percentage: None,
            created_at: Utc::now(),
            closed_at: None,
            close_reason: None,
        };

        self.trade_store.create(&trade).await?;

        let opened = self
            .position_manager
            .try_open_position(Position {
                id: Uuid::new_v4().to_string(),
                trade_id: trade.id.clone(),
                exchange: route.exchange,
                market: route.market,
                symbol: route.symbol.clone(),
                side: PositionSide::from(parsed.action),
                quantity: filled_quantity,
                entry_price,
                current_price: None,
                stop_loss: parsed.stop_loss,
                take_profit: parsed.take_profit,
                leverage,
                unrealized_pnl: None,
                status: PositionStatus::Open,
                opened_at: Utc::now(),
                closed_at: None,
            })
            .await?;
        if opened.is_none() {
            // Lost the slot between the early check and the reservation.
            return Err(ExecutionError::PositionAlreadyOpen {
                symbol: route.symbol.clone(),
                side: PositionSide::from(parsed.action).name().to_string(),
            });
        }

        Ok(trade)
    }

    async fn notify_error(&self, message: String) {
        self.notifier
            .notify(NotifyEvent::Error {
                context: "Trade Execution".to_string(),
                message,
            })
            .await;
    }
}

fn order_info(
    result: &OrderResult,
    order_type: OrderType,
    side: OrderSide,
    price: Option<f64>,
    quantity: f64,
) -> OrderInfo {
    OrderInfo {
        order_id: result.order_id.clone(),
        order_type,
        side,
        price,
        quantity: result.executed_qty.unwrap_or(quantity),
        status: result.status.clone(),
        avg_price: result.avg_price,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl SignalExecutor for TradeExecutor {
    async fn execute(&self, signal: &Signal, parsed: &ParsedSignal) -> Result<(), ExecutionError> {
        info!(
            "Executing signal {}: {} {} confidence {:.2}",
            signal.id(),
            parsed.symbol,
            parsed.action,
            parsed.confidence
        );

        // Trust boundary: the parsed signal may come from an external AI.
        if let Err(e) = validate_parsed_signal(parsed) {
            self.notify_error(e.to_string()).await;
            return Err(ExecutionError::Validation(e));
        }

        self.notifier
            .notify(NotifyEvent::SignalReceived {
                parsed: parsed.clone(),
                source: signal.raw.source,
            })
            .await;

        if parsed.confidence < self.config.confidence_threshold {
            info!(
                "Signal below executor confidence threshold: {:.2} < {:.2}",
                parsed.confidence, self.config.confidence_threshold
            );
            self.notifier
                .notify(NotifyEvent::LowConfidence {
                    parsed: parsed.clone(),
                    threshold: self.config.confidence_threshold,
                })
                .await;
            return Ok(());
        }

        let route = route_signal(parsed);
        let position_side = PositionSide::from(parsed.action);

        if !self
            .position_manager
            .can_open_position(&route.symbol, position_side)
            .await
        {
            warn!(
                "Position already exists, aborting: {} {}",
                route.symbol, position_side
            );
            let err = ExecutionError::PositionAlreadyOpen {
                symbol: route.symbol.clone(),
                side: position_side.name().to_string(),
            };
            self.notify_error(err.to_string()).await;
            return Err(err);
        }

        if self.config.simulation_mode {
            info!(
                "SIMULATION: would execute {} {} @ {} on {} {} (SL {:?}, TP {:?})",
                parsed.symbol,
                parsed.action,
                parsed.entry,
                route.exchange,
                route.market,
                parsed.stop_loss,
                parsed.take_profit
            );
            self.notifier
                .notify(NotifyEvent::SimulatedTrade {
                    parsed: parsed.clone(),
                })
                .await;
            return Ok(());
        }

        match self.execute_live(signal, parsed, &route).await {
            Ok(trade) => {
                info!(
                    "Trade executed: {} {} on {}",
                    trade.id, trade.symbol, trade.exchange
                );
                self.notifier
                    .notify(NotifyEvent::TradeExecuted { trade })
                    .await;
                Ok(())
            }
            Err(e) => {
                error!("Trade execution failed for {}: {}", signal.id(), e);
                self.notify_error(e.to_string()).await;
                Err(e)
            }
        }
    }
}
