//! Notification sink capability.
//!
//! Fire-and-forget status events for operators. Implementations must
//! swallow their own delivery failures; a lost notification is logged, never
//! propagated into the pipeline.

use async_trait::async_trait;

use crate::domain::entities::signal::{ParsedSignal, SignalSource};
use crate::domain::entities::trade::Trade;

/// Operator-facing events emitted by the pipeline.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    SignalReceived {
        parsed: ParsedSignal,
        source: SignalSource,
    },
    TradeExecuted {
        trade: Trade,
    },
    SimulatedTrade {
        parsed: ParsedSignal,
    },
    LowConfidence {
        parsed: ParsedSignal,
        threshold: f64,
    },
    Error {
        context: String,
        message: String,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotifyEvent);
}
