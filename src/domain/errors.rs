//! Error taxonomy
//!
//! Errors are grouped by the layer that raises them: validation errors are
//! never retried, exchange/vision transport errors may be retried at the
//! call site, store errors surface as job failures, and execution errors are
//! business-rule rejections reported through the notifier.

use thiserror::Error;

/// Strict-schema validation failures on a parsed signal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Entry price must be a finite positive number, got {0}")]
    InvalidEntry(f64),

    #[error("Stop loss must be a finite positive number, got {0}")]
    InvalidStopLoss(f64),

    #[error("Take profit must be a finite positive number, got {0}")]
    InvalidTakeProfit(f64),

    #[error("Leverage must be between 1 and 125, got {0}")]
    InvalidLeverage(f64),

    #[error("Confidence must be between 0 and 1, got {0}")]
    InvalidConfidence(f64),

    #[error("Quantity must be a positive number, got {0}")]
    InvalidQuantity(f64),
}

/// Transport and venue-side failures from an exchange client.
#[derive(Debug, Error, Clone)]
pub enum ExchangeError {
    #[error("Order placement failed: {0}")]
    OrderPlacementFailed(String),

    #[error("Position query failed: {0}")]
    PositionQueryFailed(String),

    #[error("Position close failed: {0}")]
    PositionCloseFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Exchange not initialized: {0}")]
    NotInitialized(String),
}

/// Failures from the multimodal extraction collaborator.
#[derive(Debug, Error, Clone)]
pub enum VisionError {
    #[error("Vision request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Vision client not configured")]
    NotConfigured,
}

impl VisionError {
    pub fn is_rate_limit(&self) -> bool {
        match self {
            VisionError::RateLimited(_) => true,
            VisionError::RequestFailed(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("429")
                    || lower.contains("rate limit")
                    || lower.contains("too many requests")
            }
            VisionError::NotConfigured => false,
        }
    }
}

/// Durable-storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> StoreError {
        StoreError::Serialization(e.to_string())
    }
}

/// Business-rule and downstream failures during trade execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Position already exists for {symbol} {side}")]
    PositionAlreadyOpen { symbol: String, side: String },

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),
}

/// Queue-layer failures.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,
}
