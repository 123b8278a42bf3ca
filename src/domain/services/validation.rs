//! Strict parsed-signal validation
//!
//! Second validation pass run by the trade executor, independent of the
//! parsers' own checks. Parsed signals may originate from an external AI
//! collaborator, so this is treated as a trust boundary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::signal::ParsedSignal;
use crate::domain::errors::ValidationError;

static SYMBOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/\-_]+$").expect("symbol pattern"));

pub const MIN_LEVERAGE: f64 = 1.0;
pub const MAX_LEVERAGE: f64 = 125.0;
pub const MAX_SYMBOL_LEN: usize = 20;

fn positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Validate a parsed signal against the strict schema.
pub fn validate_parsed_signal(parsed: &ParsedSignal) -> Result<(), ValidationError> {
    if parsed.symbol.is_empty()
        || parsed.symbol.len() > MAX_SYMBOL_LEN
        || !SYMBOL_PATTERN.is_match(&parsed.symbol)
    {
        return Err(ValidationError::InvalidSymbol(parsed.symbol.clone()));
    }

    if !positive_finite(parsed.entry) {
        return Err(ValidationError::InvalidEntry(parsed.entry));
    }

    if let Some(stop_loss) = parsed.stop_loss {
        if !positive_finite(stop_loss) {
            return Err(ValidationError::InvalidStopLoss(stop_loss));
        }
    }

    if let Some(take_profit) = parsed.take_profit {
        if !positive_finite(take_profit) {
            return Err(ValidationError::InvalidTakeProfit(take_profit));
        }
    }

    if let Some(leverage) = parsed.leverage {
        if !leverage.is_finite() || !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage) {
            return Err(ValidationError::InvalidLeverage(leverage));
        }
    }

    if !parsed.confidence.is_finite() || !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(ValidationError::InvalidConfidence(parsed.confidence));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::SignalAction;

    fn valid() -> ParsedSignal {
        ParsedSignal {
            symbol: "BTC".to_string(),
            action: SignalAction::Long,
            entry: 45000.0,
            stop_loss: Some(44000.0),
            take_profit: Some(47000.0),
            leverage: Some(10.0),
            confidence: 0.9,
            exchange: None,
            market: None,
        }
    }

    #[test]
    fn test_valid_signal_passes() {
        assert!(validate_parsed_signal(&valid()).is_ok());
    }

    #[test]
    fn test_bad_symbol_rejected() {
        let mut parsed = valid();
        parsed.symbol = String::new();
        assert!(matches!(
            validate_parsed_signal(&parsed),
            Err(ValidationError::InvalidSymbol(_))
        ));

        parsed.symbol = "BTC USD!".to_string();
        assert!(validate_parsed_signal(&parsed).is_err());

        parsed.symbol = "A".repeat(21);
        assert!(validate_parsed_signal(&parsed).is_err());
    }

    #[test]
    fn test_nonpositive_entry_rejected() {
        let mut parsed = valid();
        parsed.entry = 0.0;
        assert!(matches!(
            validate_parsed_signal(&parsed),
            Err(ValidationError::InvalidEntry(_))
        ));
        parsed.entry = f64::NAN;
        assert!(validate_parsed_signal(&parsed).is_err());
    }

    #[test]
    fn test_leverage_bounds() {
        let mut parsed = valid();
        parsed.leverage = Some(0.5);
        assert!(validate_parsed_signal(&parsed).is_err());
        parsed.leverage = Some(126.0);
        assert!(validate_parsed_signal(&parsed).is_err());
        parsed.leverage = Some(125.0);
        assert!(validate_parsed_signal(&parsed).is_ok());
        parsed.leverage = None;
        assert!(validate_parsed_signal(&parsed).is_ok());
    }

    #[test]
    fn test_confidence_bounds() {
        let mut parsed = valid();
        parsed.confidence = 1.1;
        assert!(matches!(
            validate_parsed_signal(&parsed),
            Err(ValidationError::InvalidConfidence(_))
        ));
        parsed.confidence = 1.0;
        assert!(validate_parsed_signal(&parsed).is_ok());
        parsed.confidence = 0.0;
        assert!(validate_parsed_signal(&parsed).is_ok());
    }

    #[test]
    fn test_zero_stop_loss_rejected_not_ignored() {
        // A present zero must be validated, not treated as absent.
        let mut parsed = valid();
        parsed.stop_loss = Some(0.0);
        assert!(matches!(
            validate_parsed_signal(&parsed),
            Err(ValidationError::InvalidStopLoss(_))
        ));
    }
}
