//! Vision-model chart extraction.
//!
//! Sends chart screenshots to the Gemini generateContent endpoint and turns
//! the model's JSON answer into a [`ParsedSignal`]. The model is treated as
//! untrusted: responses are re-validated downstream, and anything that does
//! not contain a recognizable signal degrades to `Ok(None)`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::entities::signal::{ParsedSignal, SignalAction};
use crate::domain::errors::VisionError;
use crate::domain::repositories::image_extractor::ImageExtractor;
use crate::domain::services::symbol::clean_symbol;
use crate::retry::{retry_with_backoff, RetryConfig};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const EXTRACTION_PROMPT: &str = "Analyze this trading chart or signal screenshot. \
If it contains a trading signal, respond with ONLY a JSON object in this exact format:\n\
{\"symbol\": \"BTC\", \"action\": \"LONG\", \"entry\": 45000, \"stopLoss\": 44000, \
\"takeProfit\": 47000, \"leverage\": 10, \"confidence\": 0.9}\n\
Rules: action is LONG or SHORT. entry, stopLoss and takeProfit are numbers. \
stopLoss, takeProfit and leverage may be null if not visible. \
confidence is your certainty from 0 to 1. \
If the image contains no trading signal, respond with {\"signal\": false}.";

/// First JSON object in the response text, to tolerate prose around it.
static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("json block pattern"));

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Take-profit may come back as a number or an array of targets.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(f64),
    Many(Vec<f64>),
}

impl OneOrMany {
    fn first(self) -> Option<f64> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(values) => values.into_iter().next(),
        }
    }
}

#[derive(Deserialize)]
struct ExtractedSignal {
    symbol: Option<String>,
    action: Option<String>,
    entry: Option<f64>,
    #[serde(rename = "stopLoss")]
    stop_loss: Option<f64>,
    #[serde(rename = "takeProfit")]
    take_profit: Option<OneOrMany>,
    leverage: Option<f64>,
    confidence: Option<f64>,
}

pub struct GeminiExtractor {
    client: Client,
    config: GeminiConfig,
    retry: RetryConfig,
}

impl GeminiExtractor {
    pub fn new(config: GeminiConfig) -> Result<Self, VisionError> {
        if config.api_key.is_empty() {
            return Err(VisionError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VisionError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            config,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(30),
            },
        })
    }

    async fn generate(&self, image_base64: &str, mime_type: &str) -> Result<String, VisionError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            GEMINI_API_BASE, self.config.model, self.config.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64.to_string(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VisionError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(VisionError::RateLimited(body));
            }
            return Err(VisionError::RequestFailed(format!("{}: {}", status, body)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VisionError::RequestFailed(e.to_string()))?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        Ok(text)
    }
}

fn positive(value: Option<f64>) -> Result<Option<f64>, ()> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        Some(_) => Err(()),
    }
}

/// Map the model's JSON text to a parsed signal. The whole payload is
/// rejected (`None`) on any schema violation: action outside LONG/SHORT,
/// missing or out-of-range confidence, non-positive prices, leverage
/// outside [1, 125].
fn parse_model_response(text: &str) -> Option<ParsedSignal> {
    let json = JSON_BLOCK.find(text)?.as_str();
    let extracted: ExtractedSignal = match serde_json::from_str(json) {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!("Unparseable vision response: {}", e);
            return None;
        }
    };

    let symbol = extracted.symbol.as_deref().map(clean_symbol)?;
    if symbol.is_empty() {
        return None;
    }
    let action = SignalAction::from_name(extracted.action.as_deref()?)?;
    let entry = extracted.entry.filter(|e| e.is_finite() && *e > 0.0)?;
    let stop_loss = positive(extracted.stop_loss).ok()?;
    let take_profit = positive(extracted.take_profit.and_then(OneOrMany::first)).ok()?;
    let leverage = match extracted.leverage {
        None => None,
        Some(l) if (1.0..=125.0).contains(&l) => Some(l),
        Some(_) => return None,
    };
    let confidence = extracted
        .confidence
        .filter(|c| (0.0..=1.0).contains(c))?;

    Some(ParsedSignal {
        symbol,
        action,
        entry,
        stop_loss,
        take_profit,
        leverage,
        confidence,
        exchange: None,
        market: None,
    })
}

#[async_trait]
impl ImageExtractor for GeminiExtractor {
    async fn extract(
        &self,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<Option<ParsedSignal>, VisionError> {
        let text = retry_with_backoff(
            "gemini extraction",
            &self.retry,
            VisionError::is_rate_limit,
            || self.generate(image_base64, mime_type),
        )
        .await?;

        debug!("Vision response: {}", text);
        let result = parse_model_response(&text);
        if result.is_none() {
            warn!("No trading signal found in image");
        }
        Ok(result)
    }
}
