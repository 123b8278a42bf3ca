//! Text signal parser
//!
//! Applies an ordered list of format patterns to free text; the first
//! pattern that matches wins, in declaration order. A matching pattern whose
//! entry price fails validation is rejected and the next pattern is tried,
//! so a pattern-level match does not imply overall success. The ordering is
//! deliberate: deterministic over optimal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use crate::domain::entities::signal::{ParsedSignal, SignalAction};

/// Shortlist of symbols the parser treats as recognized for the confidence
/// bonus. Independent from the router's classification sets.
static PARSER_CRYPTO: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "BTC", "ETH", "SOL", "XRP", "BNB", "ADA", "DOGE", "DOT", "MATIC", "LINK", "AVAX",
        "SHIB", "LTC", "UNI", "ATOM", "XLM", "ALGO", "VET", "FIL", "AAVE", "APE", "SAND",
        "MANA", "AXS", "NEAR", "FTM", "HBAR", "ICP", "EOS", "XMR",
    ]
    .into_iter()
    .collect()
});

static PARSER_STOCKS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "NVDA", "AMD", "INTC", "SPY", "QQQ",
        "DIA", "IWM", "NFLX", "BABA", "V", "JPM", "WMT", "DIS", "PYPL",
    ]
    .into_iter()
    .collect()
});

/// Token order a pattern encodes; decides which capture group is which.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    /// "BTC LONG @ 45000, SL 44000, TP 47000"
    SymbolFirst,
    /// "LONG BTC 45000 SL:44000 TP:47000"
    ActionFirst,
    /// "BTC/USDT LONG Entry: 45000 Stop: 44000 Target: 47000"
    Labelled,
    /// "BTC 45000 LONG"
    Simple,
    /// "45000 BTC LONG"
    Reverse,
}

static PATTERNS: Lazy<Vec<(PatternKind, Regex)>> = Lazy::new(|| {
    vec![
        (
            PatternKind::SymbolFirst,
            Regex::new(
                r"(?i)([A-Z]{2,10})(?:/USDT?)?\s+(LONG|SHORT|BUY|SELL)\s*@?\s*(\d+(?:\.\d+)?)\s*(?:,?\s*(?:SL|STOP|STOPLOSS)[:\s]*(\d+(?:\.\d+)?))?\s*(?:,?\s*(?:TP|TARGET|TAKEPROFIT)[:\s]*(\d+(?:\.\d+)?))?",
            )
            .expect("symbol-first pattern"),
        ),
        (
            PatternKind::ActionFirst,
            Regex::new(
                r"(?i)(LONG|SHORT|BUY|SELL)\s+([A-Z]{2,10})(?:/USDT?)?\s+(\d+(?:\.\d+)?)\s*(?:(?:SL|STOP)[:\s]*(\d+(?:\.\d+)?))?\s*(?:(?:TP|TARGET)[:\s]*(\d+(?:\.\d+)?))?",
            )
            .expect("action-first pattern"),
        ),
        (
            PatternKind::Labelled,
            Regex::new(
                r"(?i)([A-Z]{2,10})(?:/USDT?)?\s+(LONG|SHORT)\s+(?:Entry|Price)[:\s]*(\d+(?:\.\d+)?)\s*(?:(?:Stop|StopLoss)[:\s]*(\d+(?:\.\d+)?))?\s*(?:(?:Target|TP|TakeProfit)[:\s]*(\d+(?:\.\d+)?))?",
            )
            .expect("labelled pattern"),
        ),
        (
            PatternKind::Simple,
            Regex::new(r"(?i)([A-Z]{2,10})(?:/USDT?)?\s+(\d+(?:\.\d+)?)\s+(LONG|SHORT)")
                .expect("simple pattern"),
        ),
        (
            PatternKind::Reverse,
            Regex::new(r"(?i)(\d+(?:\.\d+)?)\s+([A-Z]{2,10})(?:/USDT?)?\s+(LONG|SHORT)")
                .expect("reverse pattern"),
        ),
    ]
});


fn clean_token(symbol: &str) -> String {
    symbol.to_uppercase().trim().to_string()
}

fn is_recognized(symbol: &str) -> bool {
    PARSER_CRYPTO.contains(symbol) || PARSER_STOCKS.contains(symbol)
}

fn confidence_for(has_stop_loss: bool, has_take_profit: bool, symbol_recognized: bool) -> f64 {
    let mut confidence: f64 = 0.3 + 0.2; // base + entry, entry always present on a match
    if has_stop_loss {
        confidence += 0.2;
    }
    if has_take_profit {
        confidence += 0.15;
    }
    if symbol_recognized {
        confidence += 0.15;
    }
    confidence.min(1.0)
}

fn parse_price(capture: Option<regex::Match<'_>>) -> Option<f64> {
    capture
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Parse a free-text signal. Returns `None` when no pattern matches or all
/// matching patterns fail entry validation.
pub fn parse_text_signal(text: &str) -> Option<ParsedSignal> {
    let content = text.trim();
    if content.is_empty() {
        return None;
    }

    for (kind, pattern) in PATTERNS.iter() {
        let Some(caps) = pattern.captures(content) else {
            continue;
        };
        debug!("Pattern matched: {:?}", kind);

        let (symbol, action, entry, stop_loss, take_profit) = match kind {
            PatternKind::ActionFirst => (
                clean_token(&caps[2]),
                SignalAction::normalize(&caps[1]),
                parse_price(caps.get(3)),
                parse_price(caps.get(4)),
                parse_price(caps.get(5)),
            ),
            PatternKind::Simple => (
                clean_token(&caps[1]),
                SignalAction::normalize(&caps[3]),
                parse_price(caps.get(2)),
                None,
                None,
            ),
            PatternKind::Reverse => (
                clean_token(&caps[2]),
                SignalAction::normalize(&caps[3]),
                parse_price(caps.get(1)),
                None,
                None,
            ),
            PatternKind::SymbolFirst | PatternKind::Labelled => (
                clean_token(&caps[1]),
                SignalAction::normalize(&caps[2]),
                parse_price(caps.get(3)),
                parse_price(caps.get(4)),
                parse_price(caps.get(5)),
            ),
        };

        // Reject-and-continue: a bad entry disqualifies this pattern only.
        let Some(entry) = entry else {
            debug!("Invalid entry price, trying next pattern");
            continue;
        };

        let confidence = confidence_for(
            stop_loss.is_some(),
            take_profit.is_some(),
            is_recognized(&symbol),
        );

        return Some(ParsedSignal {
            symbol,
            action,
            entry,
            stop_loss,
            take_profit,
            leverage: None,
            confidence,
            exchange: None,
            market: None,
        });
    }

    debug!("No pattern matched");
    None
}
