//! Symbol classification
//!
//! Pure, deterministic mapping from a raw ticker string to its base/quote
//! split, asset-class flags and venue-specific normalized forms. No I/O; an
//! unrecognized symbol just classifies as neither crypto nor stock.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Quote-currency suffixes stripped off crypto pairs, tried in order.
pub const CRYPTO_QUOTE_SUFFIXES: &[&str] = &["USDT", "BUSD", "BTC", "ETH", "BNB", "USDC"];

static CRYPTO_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "BTC", "ETH", "BNB", "XRP", "ADA", "DOGE", "SOL", "DOT", "AVAX", "MATIC", "LINK", "UNI",
        "ATOM", "LTC", "ETC", "FIL", "NEAR", "APT", "ARB", "OP", "INJ", "SUI", "SEI", "TIA",
        "JUP", "WIF", "PEPE", "SHIB", "BONK", "FLOKI", "AAVE", "MKR", "CRV", "LDO", "SNX",
        "COMP", "SAND", "MANA", "AXS", "GALA",
    ]
    .into_iter()
    .collect()
});

static STOCK_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AAPL", "MSFT", "GOOGL", "GOOG", "AMZN", "NVDA", "META", "TSLA", "BRK", "UNH", "JNJ",
        "V", "WMT", "JPM", "PG", "MA", "HD", "CVX", "MRK", "ABBV", "PEP", "KO", "COST", "AVGO",
        "TMO", "MCD", "CSCO", "ABT", "DHR", "ACN", "LLY", "VZ", "ADBE", "NKE", "NFLX", "CRM",
        "INTC", "AMD", "QCOM", "TXN", "SPY", "QQQ", "IWM", "DIA", "VTI", "VOO",
    ]
    .into_iter()
    .collect()
});

/// Classification of a raw ticker string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub base: String,
    pub quote: Option<&'static str>,
    /// Base+quote concatenated when a quote was present, bare base otherwise.
    pub normalized: String,
    pub is_crypto: bool,
    pub is_stock: bool,
}

/// Classify a raw ticker string.
pub fn classify(input: &str) -> SymbolInfo {
    let clean: String = input
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .collect();

    let mut base = clean.clone();
    let mut quote = None;

    for suffix in CRYPTO_QUOTE_SUFFIXES {
        if clean.ends_with(suffix) && clean.len() > suffix.len() {
            base = clean[..clean.len() - suffix.len()].to_string();
            quote = Some(*suffix);
            break;
        }
    }

    let is_crypto = CRYPTO_SET.contains(base.as_str()) || quote.is_some();
    let is_stock = STOCK_SET.contains(base.as_str()) && !is_crypto;

    let normalized = match quote {
        Some(q) => format!("{}{}", base, q),
        None => base.clone(),
    };

    SymbolInfo {
        base,
        quote,
        normalized,
        is_crypto,
        is_stock,
    }
}

/// Futures-venue symbol: appends USDT when no quote suffix is present.
pub fn to_binance_symbol(input: &str) -> String {
    let info = classify(input);
    match info.quote {
        Some(_) => info.normalized,
        None => format!("{}USDT", info.base),
    }
}

/// Equities-venue symbol: the bare base ticker.
pub fn to_ibkr_symbol(input: &str) -> String {
    classify(input).base
}

pub fn is_crypto_symbol(symbol: &str) -> bool {
    classify(symbol).is_crypto
}

pub fn is_stock_symbol(symbol: &str) -> bool {
    classify(symbol).is_stock
}

/// Strip separators, quote suffixes and a trailing PERP marker.
pub fn clean_symbol(input: &str) -> String {
    let mut s: String = input
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_' | ' '))
        .collect();
    for suffix in ["USDT", "USD", "PERP"] {
        if s.ends_with(suffix) && s.len() > suffix.len() {
            s.truncate(s.len() - suffix.len());
        }
    }
    s
}
