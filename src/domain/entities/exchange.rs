use serde::{Deserialize, Serialize};

/// Venues able to accept orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Crypto futures venue
    Binance,
    /// Equities venue
    Ibkr,
}

impl Exchange {
    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Binance => "binance",
            Exchange::Ibkr => "ibkr",
        }
    }

    pub fn from_name(name: &str) -> Option<Exchange> {
        match name.to_ascii_lowercase().as_str() {
            "binance" => Some(Exchange::Binance),
            "ibkr" => Some(Exchange::Ibkr),
            _ => None,
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Market segment an order targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Futures,
    Spot,
    Stock,
}

impl Market {
    pub fn name(&self) -> &'static str {
        match self {
            Market::Futures => "futures",
            Market::Spot => "spot",
            Market::Stock => "stock",
        }
    }

    pub fn from_name(name: &str) -> Option<Market> {
        match name.to_ascii_lowercase().as_str() {
            "futures" => Some(Market::Futures),
            "spot" => Some(Market::Spot),
            "stock" => Some(Market::Stock),
            _ => None,
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
