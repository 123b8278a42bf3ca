//! Signal merge
//!
//! Combines the image-sourced and text-sourced parse results into one
//! candidate. The image result wins for symbol/action/entry; the optional
//! fields coalesce on presence (`Option::or`, never on value), so a present
//! zero would not be treated as absent. Confidence takes the max of the two
//! sources, not the average.

use tracing::debug;

use crate::domain::entities::signal::ParsedSignal;

/// Deterministic merge of two optional parse results.
pub fn merge_signal_results(
    image: Option<ParsedSignal>,
    text: Option<ParsedSignal>,
) -> Option<ParsedSignal> {
    match (image, text) {
        (None, None) => None,
        (Some(image), None) => Some(image),
        (None, Some(text)) => Some(text),
        (Some(image), Some(text)) => {
            let merged = ParsedSignal {
                symbol: if image.symbol.is_empty() {
                    text.symbol.clone()
                } else {
                    image.symbol.clone()
                },
                action: image.action,
                entry: image.entry,
                stop_loss: image.stop_loss.or(text.stop_loss),
                take_profit: image.take_profit.or(text.take_profit),
                leverage: image.leverage.or(text.leverage),
                confidence: image.confidence.max(text.confidence),
                exchange: image.exchange.or(text.exchange),
                market: image.market.or(text.market),
            };
            debug!(
                "Merged signal results: image {} ({:.2}) + text {} ({:.2}) -> {} ({:.2})",
                image.symbol,
                image.confidence,
                text.symbol,
                text.confidence,
                merged.symbol,
                merged.confidence
            );
            Some(merged)
        }
    }
}
