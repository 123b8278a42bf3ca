//! Execution capability consumed by the signal processor.
//!
//! Injected at processor construction; there is no settable callback, so a
//! processor without an executor is an explicit, visible configuration.

use async_trait::async_trait;

use crate::domain::entities::signal::{ParsedSignal, Signal};
use crate::domain::errors::ExecutionError;

#[async_trait]
pub trait SignalExecutor: Send + Sync {
    /// Execute a parsed, threshold-passing signal.
    async fn execute(&self, signal: &Signal, parsed: &ParsedSignal) -> Result<(), ExecutionError>;
}
