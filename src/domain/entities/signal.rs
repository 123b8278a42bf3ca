//! Signal entities
//!
//! A `RawSignal` is the immutable inbound payload (text and/or chart image)
//! plus the identifiers needed for dedup. A `ParsedSignal` is the structured
//! trade extracted from it. A `Signal` is the persisted pair with its
//! lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::entities::exchange::{Exchange, Market};

/// Where a raw signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Text,
    Image,
    Webhook,
}

impl SignalSource {
    pub fn name(&self) -> &'static str {
        match self {
            SignalSource::Text => "text",
            SignalSource::Image => "image",
            SignalSource::Webhook => "webhook",
        }
    }

    pub fn from_name(name: &str) -> Option<SignalSource> {
        match name {
            "text" => Some(SignalSource::Text),
            "image" => Some(SignalSource::Image),
            "webhook" => Some(SignalSource::Webhook),
            _ => None,
        }
    }
}

/// Lifecycle status of a signal.
///
/// `Pending -> Parsed -> {Executed, Skipped}` on the happy paths,
/// `Failed` on parse or execution failure. Signals are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Processing,
    Parsed,
    Executed,
    Skipped,
    Failed,
}

impl SignalStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Processing => "processing",
            SignalStatus::Parsed => "parsed",
            SignalStatus::Executed => "executed",
            SignalStatus::Skipped => "skipped",
            SignalStatus::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Option<SignalStatus> {
        match name {
            "pending" => Some(SignalStatus::Pending),
            "processing" => Some(SignalStatus::Processing),
            "parsed" => Some(SignalStatus::Parsed),
            "executed" => Some(SignalStatus::Executed),
            "skipped" => Some(SignalStatus::Skipped),
            "failed" => Some(SignalStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trade direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl SignalAction {
    pub fn name(&self) -> &'static str {
        match self {
            SignalAction::Long => "LONG",
            SignalAction::Short => "SHORT",
        }
    }

    /// Strict action parser: only the canonical LONG/SHORT tokens.
    pub fn from_name(name: &str) -> Option<SignalAction> {
        match name {
            "LONG" => Some(SignalAction::Long),
            "SHORT" => Some(SignalAction::Short),
            _ => None,
        }
    }

    /// Normalize a free-form action token. BUY/LONG map to Long,
    /// SELL/SHORT map to Short, anything else defaults to Long.
    pub fn normalize(token: &str) -> SignalAction {
        match token.to_ascii_uppercase().as_str() {
            "SELL" | "SHORT" => SignalAction::Short,
            _ => SignalAction::Long,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Immutable inbound signal payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignal {
    pub id: String,
    pub source: SignalSource,
    pub raw_content: String,
    pub image_base64: Option<String>,
    pub image_mime_type: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub message_id: String,
    /// Content-addressed dedup key, see [`signal_hash`].
    pub hash: String,
    pub received_at: DateTime<Utc>,
}

impl RawSignal {
    /// Build a raw signal, computing its id and content hash.
    pub fn new(
        source: SignalSource,
        raw_content: String,
        image_base64: Option<String>,
        image_mime_type: Option<String>,
        channel_id: String,
        user_id: String,
        message_id: String,
    ) -> RawSignal {
        let hash = signal_hash(&raw_content, image_base64.as_deref(), &message_id);
        RawSignal {
            id: Uuid::new_v4().to_string(),
            source,
            raw_content,
            image_base64,
            image_mime_type,
            channel_id,
            user_id,
            message_id,
            hash,
            received_at: Utc::now(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.image_base64.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_text(&self) -> bool {
        !self.raw_content.trim().is_empty()
    }
}

/// Structured trade parameters extracted from a raw signal.
///
/// Optional fields use `None` for "absent", never a sentinel value, so the
/// merge step can distinguish a missing stop-loss from a present one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSignal {
    pub symbol: String,
    pub action: SignalAction,
    pub entry: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<f64>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<Exchange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
}

/// A raw signal with its extracted form and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(flatten)]
    pub raw: RawSignal,
    pub parsed: Option<ParsedSignal>,
    pub status: SignalStatus,
    pub status_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Wrap a raw signal into a fresh pending signal.
    pub fn pending(raw: RawSignal) -> Signal {
        Signal {
            raw,
            parsed: None,
            status: SignalStatus::Pending,
            status_reason: None,
            processed_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.raw.id
    }

    pub fn hash(&self) -> &str {
        &self.raw.hash
    }
}

/// SHA-256 digest over text content, image payload and message identifier.
///
/// Identical content resubmitted under the same message id hashes the same,
/// which is exactly what the dedup gates key on.
pub fn signal_hash(content: &str, image_base64: Option<&str>, message_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(b":");
    hasher.update(image_base64.unwrap_or_default().as_bytes());
    hasher.update(b":");
    hasher.update(message_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// First 16 hex chars, for log lines.
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(16)]
}
