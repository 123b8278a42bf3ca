//! SignalQueue
//!
//! Single-worker in-process queue in front of the processor. Guarantees
//! one-at-a-time processing, content-hash dedup across waiting, active and
//! retained jobs, paced job starts, and bounded retry with exponential
//! backoff for transient store failures.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::processor::{ProcessOutcome, SignalProcessor};
use crate::domain::entities::signal::{short_hash, RawSignal, SignalStatus};
use crate::domain::errors::QueueError;
use crate::rate_limit::{create_pacing_limiter, GlobalRateLimiter};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Attempts per job, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each failure
    pub backoff_base: Duration,
    /// Retained completed-job records
    pub max_completed: usize,
    /// Retained failed-job records
    pub max_failed: usize,
    /// Job starts allowed per `rate_limit_window`
    pub rate_limit_jobs: u32,
    pub rate_limit_window: Duration,
    /// Buffered waiting jobs before `enqueue` applies backpressure
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            max_completed: 1000,
            max_failed: 500,
            rate_limit_jobs: 10,
            rate_limit_window: Duration::from_secs(10),
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Same content hash is already waiting, active or retained.
    Duplicate,
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueued { hash: String },
    Duplicate { hash: String },
    Completed { hash: String, status: Option<SignalStatus> },
    Failed { hash: String, reason: String },
}

/// Terminal record kept for observability after a job finishes.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub hash: String,
    pub signal_id: Option<String>,
    pub status: Option<SignalStatus>,
    pub reason: Option<String>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub duplicates: u64,
}

#[derive(Default)]
struct QueueState {
    /// Hashes of every live job: waiting, active, or still retained.
    seen: HashSet<String>,
    completed: VecDeque<JobRecord>,
    failed: VecDeque<JobRecord>,
    waiting: usize,
    active: usize,
    completed_total: u64,
    failed_total: u64,
    duplicates: u64,
}

impl QueueState {
    fn retain(&mut self, record: JobRecord, failed: bool, config: &QueueConfig) {
        let (deque, cap) = if failed {
            self.failed_total += 1;
            (&mut self.failed, config.max_failed)
        } else {
            self.completed_total += 1;
            (&mut self.completed, config.max_completed)
        };
        deque.push_back(record);
        // Evicted records leave the dedup window with their hash.
        while deque.len() > cap {
            if let Some(evicted) = deque.pop_front() {
                self.seen.remove(&evicted.hash);
            }
        }
    }
}

pub struct SignalQueue {
    tx: mpsc::Sender<RawSignal>,
    state: Arc<Mutex<QueueState>>,
    events: broadcast::Sender<QueueEvent>,
}

impl SignalQueue {
    /// Spawn the queue and its single worker task.
    ///
    /// The worker exits once every queue handle has been dropped and the
    /// buffered jobs are drained, which is the shutdown path.
    pub fn start(
        processor: Arc<SignalProcessor>,
        config: QueueConfig,
    ) -> (Arc<SignalQueue>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (events, _) = broadcast::channel(64);
        let state = Arc::new(Mutex::new(QueueState::default()));
        let limiter = create_pacing_limiter(config.rate_limit_jobs, config.rate_limit_window);

        let queue = Arc::new(SignalQueue {
            tx,
            state: state.clone(),
            events: events.clone(),
        });
        let worker = tokio::spawn(run_worker(rx, processor, config, state, events, limiter));
        (queue, worker)
    }

    /// Queue a raw signal, refusing content already in the dedup window.
    pub async fn enqueue(&self, raw: RawSignal) -> Result<EnqueueOutcome, QueueError> {
        let hash = raw.hash.clone();
        {
            let mut state = self.state.lock().await;
            if !state.seen.insert(hash.clone()) {
                state.duplicates += 1;
                info!("Ignoring duplicate signal {}", short_hash(&hash));
                let _ = self.events.send(QueueEvent::Duplicate { hash });
                return Ok(EnqueueOutcome::Duplicate);
            }
            state.waiting += 1;
        }

        if self.tx.send(raw).await.is_err() {
            let mut state = self.state.lock().await;
            state.seen.remove(&hash);
            state.waiting -= 1;
            return Err(QueueError::Closed);
        }

        let _ = self.events.send(QueueEvent::Enqueued { hash });
        Ok(EnqueueOutcome::Queued)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            waiting: state.waiting,
            active: state.active,
            completed: state.completed_total,
            failed: state.failed_total,
            duplicates: state.duplicates,
        }
    }

    pub async fn recent_failed(&self) -> Vec<JobRecord> {
        self.state.lock().await.failed.iter().cloned().collect()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<RawSignal>,
    processor: Arc<SignalProcessor>,
    config: QueueConfig,
    state: Arc<Mutex<QueueState>>,
    events: broadcast::Sender<QueueEvent>,
    limiter: GlobalRateLimiter,
) {
    while let Some(raw) = rx.recv().await {
        {
            let mut state = state.lock().await;
            state.waiting -= 1;
            state.active = 1;
        }
        limiter.until_ready().await;

        let hash = raw.hash.clone();
        let mut attempts = 0;
        let mut delay = config.backoff_base;
        let result = loop {
            attempts += 1;
            match processor.process(&raw).await {
                Ok(outcome) => break Ok(outcome),
                Err(e) if attempts < config.max_attempts => {
                    warn!(
                        "Job {} failed (attempt {}/{}), retrying in {:?}: {}",
                        short_hash(&hash),
                        attempts,
                        config.max_attempts,
                        delay,
                        e
                    );
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => break Err(e),
            }
        };

        let mut state = state.lock().await;
        state.active = 0;
        match result {
            Ok(ProcessOutcome::Paused) => {
                let reason = "Processing paused".to_string();
                let _ = events.send(QueueEvent::Failed {
                    hash: hash.clone(),
                    reason: reason.clone(),
                });
                state.retain(
                    JobRecord {
                        hash,
                        signal_id: None,
                        status: None,
                        reason: Some(reason),
                        attempts,
                    },
                    true,
                    &config,
                );
            }
            Ok(outcome) => {
                let status = outcome.status();
                let (signal_id, reason) = match outcome {
                    ProcessOutcome::Duplicate { signal_id, .. } => (Some(signal_id), None),
                    ProcessOutcome::Done {
                        signal_id, reason, ..
                    } => (Some(signal_id), reason),
                    ProcessOutcome::Paused => (None, None),
                };
                let _ = events.send(QueueEvent::Completed {
                    hash: hash.clone(),
                    status,
                });
                state.retain(
                    JobRecord {
                        hash,
                        signal_id,
                        status,
                        reason,
                        attempts,
                    },
                    false,
                    &config,
                );
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    "Job {} exhausted {} attempts: {}",
                    short_hash(&hash),
                    attempts,
                    reason
                );
                let _ = events.send(QueueEvent::Failed {
                    hash: hash.clone(),
                    reason: reason.clone(),
                });
                state.retain(
                    JobRecord {
                        hash,
                        signal_id: None,
                        status: None,
                        reason: Some(reason),
                        attempts,
                    },
                    true,
                    &config,
                );
            }
        }
    }
    info!("Signal queue worker stopped");
}
