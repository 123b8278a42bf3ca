//! TradeWire
//!
//! Trading-signal ingestion service: raw text and chart screenshots come in,
//! get parsed, merged, queued and routed, and come out as orders on a
//! brokerage venue (or as simulated trades, the default).

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod retry;
