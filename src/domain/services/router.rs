//! Trade router
//!
//! Pure decision function mapping a parsed signal to a venue, market and
//! venue-normalized symbol. Explicit venue+market hints are trusted
//! unconditionally. Without hints, classification decides; ambiguous or
//! unknown symbols default to the crypto futures venue with degraded
//! confidence (the system's primary use case is crypto, so the tie-break is
//! deliberate).

use tracing::{debug, warn};

use crate::domain::entities::exchange::{Exchange, Market};
use crate::domain::entities::signal::ParsedSignal;
use crate::domain::services::symbol::{
    is_crypto_symbol, is_stock_symbol, to_binance_symbol, to_ibkr_symbol,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub exchange: Exchange,
    pub market: Market,
    pub symbol: String,
    pub confidence: f64,
}

pub fn route_signal(parsed: &ParsedSignal) -> RouteDecision {
    if let (Some(exchange), Some(market)) = (parsed.exchange, parsed.market) {
        debug!("Using signal hints: {} {}", exchange, market);
        let symbol = match exchange {
            Exchange::Binance => to_binance_symbol(&parsed.symbol),
            Exchange::Ibkr => to_ibkr_symbol(&parsed.symbol),
        };
        return RouteDecision {
            exchange,
            market,
            symbol,
            confidence: 1.0,
        };
    }

    let is_crypto = is_crypto_symbol(&parsed.symbol);
    let is_stock = is_stock_symbol(&parsed.symbol);

    let decision = if is_crypto && !is_stock {
        RouteDecision {
            exchange: Exchange::Binance,
            market: Market::Futures,
            symbol: to_binance_symbol(&parsed.symbol),
            confidence: 0.95,
        }
    } else if is_stock && !is_crypto {
        RouteDecision {
            exchange: Exchange::Ibkr,
            market: Market::Stock,
            symbol: to_ibkr_symbol(&parsed.symbol),
            confidence: 0.95,
        }
    } else if is_crypto && is_stock {
        warn!("Ambiguous symbol {}, defaulting to crypto", parsed.symbol);
        RouteDecision {
            exchange: Exchange::Binance,
            market: Market::Futures,
            symbol: to_binance_symbol(&parsed.symbol),
            confidence: 0.7,
        }
    } else {
        warn!("Unknown symbol type {}, defaulting to crypto", parsed.symbol);
        RouteDecision {
            exchange: Exchange::Binance,
            market: Market::Futures,
            symbol: to_binance_symbol(&parsed.symbol),
            confidence: 0.5,
        }
    };

    debug!(
        "Signal routed: {} -> {} {} {} ({:.2})",
        parsed.symbol, decision.exchange, decision.market, decision.symbol, decision.confidence
    );
    decision
}
