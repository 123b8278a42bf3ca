//! SignalProcessor service
//!
//! Runs one queued signal through the full pipeline: dedup, persistence,
//! image and text extraction, merge, the confidence gate and execution.
//! Each step records the signal's lifecycle status so the control surface
//! can always answer what happened to a given message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::entities::signal::{ParsedSignal, RawSignal, SignalStatus};
use crate::domain::errors::StoreError;
use crate::domain::repositories::executor::SignalExecutor;
use crate::domain::repositories::image_extractor::ImageExtractor;
use crate::domain::repositories::stores::SignalStore;
use crate::domain::services::merge::merge_signal_results;
use crate::domain::services::text_parser::parse_text_signal;
use crate::domain::entities::signal::short_hash;

/// Terminal result of one processing job.
///
/// Errors returned from [`SignalProcessor::process`] are infrastructure
/// failures the queue may retry; everything business-level lands here.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Processing is paused; the job was not attempted.
    Paused,
    /// A signal with the same content hash was already processed.
    Duplicate {
        signal_id: String,
        status: SignalStatus,
    },
    /// The signal ran through the pipeline and reached a final status.
    Done {
        signal_id: String,
        status: SignalStatus,
        reason: Option<String>,
    },
}

impl ProcessOutcome {
    pub fn status(&self) -> Option<SignalStatus> {
        match self {
            ProcessOutcome::Paused => None,
            ProcessOutcome::Duplicate { status, .. } => Some(*status),
            ProcessOutcome::Done { status, .. } => Some(*status),
        }
    }
}

pub struct SignalProcessor {
    signal_store: Arc<dyn SignalStore>,
    image_extractor: Option<Arc<dyn ImageExtractor>>,
    executor: Option<Arc<dyn SignalExecutor>>,
    paused: AtomicBool,
    confidence_threshold: RwLock<f64>,
}

impl SignalProcessor {
    pub fn new(
        signal_store: Arc<dyn SignalStore>,
        image_extractor: Option<Arc<dyn ImageExtractor>>,
        executor: Option<Arc<dyn SignalExecutor>>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            signal_store,
            image_extractor,
            executor,
            paused: AtomicBool::new(false),
            confidence_threshold: RwLock::new(confidence_threshold.clamp(0.0, 1.0)),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("Signal processing paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("Signal processing resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub async fn confidence_threshold(&self) -> f64 {
        *self.confidence_threshold.read().await
    }

    pub async fn set_confidence_threshold(&self, threshold: f64) -> f64 {
        let clamped = threshold.clamp(0.0, 1.0);
        *self.confidence_threshold.write().await = clamped;
        info!("Confidence threshold set to {:.2}", clamped);
        clamped
    }

    /// Process one raw signal to a terminal status.
    ///
    /// Returns `Err` only for store failures, which the caller may retry;
    /// parse and execution failures are recorded on the signal itself.
    pub async fn process(&self, raw: &RawSignal) -> Result<ProcessOutcome, StoreError> {
        if self.is_paused() {
            warn!("Processing paused, dropping signal {}", short_hash(&raw.hash));
            return Ok(ProcessOutcome::Paused);
        }

        // Content-hash idempotency. Ingestion filters duplicates too, but a
        // restart or concurrent producers can get the same content this far.
        if let Some(existing) = self.signal_store.find_by_hash(&raw.hash).await? {
            info!(
                "Duplicate signal {} already {} as {}",
                short_hash(&raw.hash),
                existing.status,
                existing.id()
            );
            return Ok(ProcessOutcome::Duplicate {
                signal_id: existing.id().to_string(),
                status: existing.status,
            });
        }

        let signal = self.signal_store.create(raw).await?;
        self.signal_store
            .update_status(signal.id(), SignalStatus::Processing, None)
            .await?;

        let image_result = self.extract_from_image(raw).await;
        let text_result = if raw.has_text() {
            parse_text_signal(&raw.raw_content)
        } else {
            None
        };
        debug!(
            "Extraction for {}: image={} text={}",
            short_hash(&raw.hash),
            image_result.is_some(),
            text_result.is_some()
        );

        let Some(parsed) = merge_signal_results(image_result, text_result) else {
            let reason = "Failed to parse signal content".to_string();
            self.signal_store
                .update_status(signal.id(), SignalStatus::Failed, Some(&reason))
                .await?;
            return Ok(ProcessOutcome::Done {
                signal_id: signal.id().to_string(),
                status: SignalStatus::Failed,
                reason: Some(reason),
            });
        };

        let parsed_signal = self
            .signal_store
            .update_parsed(signal.id(), &parsed, SignalStatus::Parsed)
            .await?;
        info!(
            "Parsed signal {}: {} {} @ {} (confidence {:.2})",
            signal.id(),
            parsed.symbol,
            parsed.action,
            parsed.entry,
            parsed.confidence
        );

        let threshold = self.confidence_threshold().await;
        if parsed.confidence < threshold {
            let reason = format!(
                "Confidence {:.0}% below threshold {:.0}%",
                parsed.confidence * 100.0,
                threshold * 100.0
            );
            self.signal_store
                .update_status(signal.id(), SignalStatus::Skipped, Some(&reason))
                .await?;
            return Ok(ProcessOutcome::Done {
                signal_id: signal.id().to_string(),
                status: SignalStatus::Skipped,
                reason: Some(reason),
            });
        }

        let Some(executor) = &self.executor else {
            warn!("No executor configured, leaving signal {} parsed", signal.id());
            return Ok(ProcessOutcome::Done {
                signal_id: signal.id().to_string(),
                status: SignalStatus::Parsed,
                reason: None,
            });
        };

        match executor.execute(&parsed_signal, &parsed).await {
            Ok(()) => {
                self.signal_store
                    .update_status(signal.id(), SignalStatus::Executed, None)
                    .await?;
                Ok(ProcessOutcome::Done {
                    signal_id: signal.id().to_string(),
                    status: SignalStatus::Executed,
                    reason: None,
                })
            }
            Err(e) => {
                let reason = format!("Execution failed: {}", e);
                warn!("Signal {}: {}", signal.id(), reason);
                self.signal_store
                    .update_status(signal.id(), SignalStatus::Failed, Some(&reason))
                    .await?;
                Ok(ProcessOutcome::Done {
                    signal_id: signal.id().to_string(),
                    status: SignalStatus::Failed,
                    reason: Some(reason),
                })
            }
        }
    }

    /// Image extraction is best effort: any extractor failure degrades to
    /// "no image result" so the text branch can still carry the signal.
    async fn extract_from_image(&self, raw: &RawSignal) -> Option<ParsedSignal> {
        let extractor = self.image_extractor.as_ref()?;
        if !raw.has_image() {
            return None;
        }
        let image = raw.image_base64.as_deref()?;
        let mime = raw.image_mime_type.as_deref().unwrap_or("image/png");
        match extractor.extract(image, mime).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Image extraction failed for {}: {}", short_hash(&raw.hash), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::signal::{Signal, SignalAction, SignalSource};
    use crate::domain::errors::{ExecutionError, VisionError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemorySignalStore {
        signals: Mutex<HashMap<String, Signal>>,
    }

    #[async_trait]
    impl SignalStore for MemorySignalStore {
        async fn create(&self, raw: &RawSignal) -> Result<Signal, StoreError> {
            let signal = Signal::pending(raw.clone());
            self.signals
                .lock()
                .await
                .insert(signal.id().to_string(), signal.clone());
            Ok(signal)
        }

        async fn find_by_hash(&self, hash: &str) -> Result<Option<Signal>, StoreError> {
            Ok(self
                .signals
                .lock()
                .await
                .values()
                .find(|s| s.hash() == hash)
                .cloned())
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Signal>, StoreError> {
            Ok(self.signals.lock().await.get(id).cloned())
        }

        async fn exists(&self, hash: &str) -> Result<bool, StoreError> {
            Ok(self.find_by_hash(hash).await?.is_some())
        }

        async fn update_status(
            &self,
            id: &str,
            status: SignalStatus,
            reason: Option<&str>,
        ) -> Result<(), StoreError> {
            let mut signals = self.signals.lock().await;
            let signal = signals
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            signal.status = status;
            signal.status_reason = reason.map(String::from);
            Ok(())
        }

        async fn update_parsed(
            &self,
            id: &str,
            parsed: &ParsedSignal,
            status: SignalStatus,
        ) -> Result<Signal, StoreError> {
            let mut signals = self.signals.lock().await;
            let signal = signals
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            signal.parsed = Some(parsed.clone());
            signal.status = status;
            Ok(signal.clone())
        }

        async fn find_recent(&self, limit: i64) -> Result<Vec<Signal>, StoreError> {
            let signals = self.signals.lock().await;
            Ok(signals.values().take(limit as usize).cloned().collect())
        }

        async fn count_by_status(&self, status: SignalStatus) -> Result<i64, StoreError> {
            let signals = self.signals.lock().await;
            Ok(signals.values().filter(|s| s.status == status).count() as i64)
        }
    }

    struct StubExtractor {
        result: Option<ParsedSignal>,
        fail: bool,
    }

    #[async_trait]
    impl ImageExtractor for StubExtractor {
        async fn extract(
            &self,
            _image_base64: &str,
            _mime_type: &str,
        ) -> Result<Option<ParsedSignal>, VisionError> {
            if self.fail {
                Err(VisionError::RequestFailed("boom".to_string()))
            } else {
                Ok(self.result.clone())
            }
        }
    }

    #[derive(Default)]
    struct StubExecutor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SignalExecutor for StubExecutor {
        async fn execute(
            &self,
            _signal: &Signal,
            _parsed: &ParsedSignal,
        ) -> Result<(), ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExecutionError::UnsupportedExchange("kraken".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn text_signal(content: &str, message_id: &str) -> RawSignal {
        RawSignal::new(
            SignalSource::Text,
            content.to_string(),
            None,
            None,
            "chan".to_string(),
            "user".to_string(),
            message_id.to_string(),
        )
    }

    fn image_parsed(symbol: &str, confidence: f64) -> ParsedSignal {
        ParsedSignal {
            symbol: symbol.to_string(),
            action: SignalAction::Long,
            entry: 45000.0,
            stop_loss: None,
            take_profit: None,
            leverage: None,
            confidence,
            exchange: None,
            market: None,
        }
    }

    fn processor(
        store: Arc<MemorySignalStore>,
        extractor: Option<Arc<dyn ImageExtractor>>,
        executor: Option<Arc<dyn SignalExecutor>>,
    ) -> SignalProcessor {
        SignalProcessor::new(store, extractor, executor, 0.7)
    }

    #[tokio::test]
    async fn test_full_signal_executes() {
        let store = Arc::new(MemorySignalStore::default());
        let executor = Arc::new(StubExecutor::default());
        let p = processor(store.clone(), None, Some(executor.clone()));

        let outcome = p
            .process(&text_signal(
                "LONG BTC 45000 SL:44000 TP:47000",
                "m1",
            ))
            .await
            .unwrap();
        assert_eq!(outcome.status(), Some(SignalStatus::Executed));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_hash_processes_once() {
        let store = Arc::new(MemorySignalStore::default());
        let executor = Arc::new(StubExecutor::default());
        let p = processor(store.clone(), None, Some(executor.clone()));

        let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "m1");
        let first = p.process(&raw).await.unwrap();
        let second = p.process(&raw).await.unwrap();

        assert_eq!(first.status(), Some(SignalStatus::Executed));
        assert!(matches!(second, ProcessOutcome::Duplicate { .. }));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_content_marks_failed() {
        let store = Arc::new(MemorySignalStore::default());
        let p = processor(store.clone(), None, None);

        let outcome = p
            .process(&text_signal("gm everyone, great day to trade", "m2"))
            .await
            .unwrap();
        let ProcessOutcome::Done { status, reason, .. } = outcome else {
            panic!("expected Done outcome");
        };
        assert_eq!(status, SignalStatus::Failed);
        assert_eq!(reason.as_deref(), Some("Failed to parse signal content"));
    }

    #[tokio::test]
    async fn test_below_threshold_skipped_with_reason() {
        let store = Arc::new(MemorySignalStore::default());
        let executor = Arc::new(StubExecutor::default());
        let p = processor(store.clone(), None, Some(executor.clone()));

        // Simple-format parse without stop or target lands at 0.65.
        let outcome = p.process(&text_signal("BTC 45000 LONG", "m3")).await.unwrap();
        let ProcessOutcome::Done { status, reason, .. } = outcome else {
            panic!("expected Done outcome");
        };
        assert_eq!(status, SignalStatus::Skipped);
        assert_eq!(reason.as_deref(), Some("Confidence 65% below threshold 70%"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_adjustable_at_runtime() {
        let store = Arc::new(MemorySignalStore::default());
        let executor = Arc::new(StubExecutor::default());
        let p = processor(store.clone(), None, Some(executor.clone()));

        assert_eq!(p.set_confidence_threshold(0.6).await, 0.6);
        let outcome = p.process(&text_signal("BTC 45000 LONG", "m4")).await.unwrap();
        assert_eq!(outcome.status(), Some(SignalStatus::Executed));

        // Out-of-range values clamp instead of erroring.
        assert_eq!(p.set_confidence_threshold(7.0).await, 1.0);
    }

    #[tokio::test]
    async fn test_execution_failure_marks_signal_failed() {
        let store = Arc::new(MemorySignalStore::default());
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let p = processor(store.clone(), None, Some(executor));

        let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "m5");
        let outcome = p.process(&raw).await.unwrap();
        let ProcessOutcome::Done { status, reason, .. } = outcome else {
            panic!("expected Done outcome");
        };
        assert_eq!(status, SignalStatus::Failed);
        assert!(reason.as_deref().is_some_and(|r| r.starts_with("Execution failed:")));
    }

    #[tokio::test]
    async fn test_image_result_takes_precedence_over_text() {
        let store = Arc::new(MemorySignalStore::default());
        let extractor = Arc::new(StubExtractor {
            result: Some(image_parsed("ETH", 0.9)),
            fail: false,
        });
        let p = processor(store.clone(), Some(extractor), None);

        let mut raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "m6");
        raw.image_base64 = Some("aGVsbG8=".to_string());

        let outcome = p.process(&raw).await.unwrap();
        let ProcessOutcome::Done { signal_id, .. } = outcome else {
            panic!("expected Done outcome");
        };
        let stored = store.find_by_id(&signal_id).await.unwrap().unwrap();
        let parsed = stored.parsed.unwrap();
        assert_eq!(parsed.symbol, "ETH");
        // Text-only fields survive the merge.
        assert_eq!(parsed.stop_loss, Some(44000.0));
    }

    #[tokio::test]
    async fn test_extractor_failure_falls_back_to_text() {
        let store = Arc::new(MemorySignalStore::default());
        let extractor = Arc::new(StubExtractor {
            result: None,
            fail: true,
        });
        let executor = Arc::new(StubExecutor::default());
        let p = processor(store.clone(), Some(extractor), Some(executor.clone()));

        let mut raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "m7");
        raw.image_base64 = Some("aGVsbG8=".to_string());

        let outcome = p.process(&raw).await.unwrap();
        assert_eq!(outcome.status(), Some(SignalStatus::Executed));
    }

    #[tokio::test]
    async fn test_paused_processor_rejects_jobs() {
        let store = Arc::new(MemorySignalStore::default());
        let p = processor(store.clone(), None, None);
        p.pause();

        let raw = text_signal("LONG BTC 45000 SL:44000 TP:47000", "m8");
        assert_eq!(p.process(&raw).await.unwrap(), ProcessOutcome::Paused);

        p.resume();
        let outcome = p.process(&raw).await.unwrap();
        assert_eq!(outcome.status(), Some(SignalStatus::Parsed));
    }
}
