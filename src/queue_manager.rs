//! Queue Manager for RecoBattle
//!
//! Accepted uploads are handed to a background dispatcher through a bounded
//! channel. The dispatcher starts one task per job and caps the number of
//! simultaneous ASR calls with a semaphore.
//!
//! A slot in the channel is reserved *before* the file record is created, so a
//! saturated queue rejects the upload instead of leaving a record that will never
//! be processed.
//!
//! Shutdown happens in two phases. First new reservations are refused while
//! everything already accepted (running or still queued) gets a grace period to
//! finish. Then running jobs are cancelled, queued ones are dropped, and both are
//! awaited.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::asr::AsrProvider;
use crate::audio_files::{AudioFile, AudioFiles, ProcessError};
use crate::config::ProcessingConfig;
use crate::metrics::Metrics;

/// Everything a background task needs to run one job
pub struct ProcessingRequest {
    pub file: AudioFile,
    pub provider: Arc<dyn AsrProvider>,
    pub audio: Vec<u8>,
}

/// Queue manager error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// Every slot of the bounded queue is taken
    #[error("Processing queue is full")]
    QueueFull,
    /// Intake stopped because the service is shutting down
    #[error("Processing queue is shutting down")]
    ShuttingDown,
}

/// Snapshot of the queue counters
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Submitted, waiting for a processing slot
    pub queued: usize,
    /// Currently running
    pub processing: usize,
    pub processed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub capacity: usize,
    pub max_concurrent_jobs: usize,
}

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    processing: AtomicUsize,
    processed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// A reserved place in the queue.
///
/// Dropping the slot without submitting releases it.
pub struct QueueSlot {
    permit: OwnedPermit<ProcessingRequest>,
    counters: Arc<Counters>,
}

impl QueueSlot {
    /// Hand the request to the dispatcher; cannot fail once the slot is held
    pub fn submit(self, request: ProcessingRequest) {
        debug!("Queueing file {}", request.file.file_id);
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        self.permit.send(request);
    }
}

/// Queue Manager for handling ASR jobs
pub struct QueueManager {
    job_tx: mpsc::Sender<ProcessingRequest>,
    /// Rejects new reservations; the dispatcher drains what is queued and exits
    intake: CancellationToken,
    /// Aborts in-flight jobs at their next blocking boundary and stops dispatch
    cancel: CancellationToken,
    tracker: TaskTracker,
    counters: Arc<Counters>,
    config: ProcessingConfig,
}

impl QueueManager {
    /// Create a new queue manager and start the background dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(audio_files: Arc<AudioFiles>, config: ProcessingConfig, metrics: Metrics) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (job_tx, job_rx) = mpsc::channel(capacity);

        let manager = Self {
            job_tx,
            intake: CancellationToken::new(),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
            config,
        };

        manager.start_dispatcher(job_rx, audio_files, metrics);
        info!(
            "Queue manager started (capacity {}, max concurrent jobs {})",
            capacity, manager.config.max_concurrent_jobs
        );
        manager
    }

    /// Reserve a slot in the queue
    pub fn try_reserve(&self) -> Result<QueueSlot, QueueError> {
        if self.intake.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }

        match self.job_tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot {
                permit,
                counters: self.counters.clone(),
            }),
            Err(TrySendError::Full(_)) => {
                warn!("Processing queue is full, rejecting upload");
                Err(QueueError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::ShuttingDown),
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.counters.queued.load(Ordering::SeqCst),
            processing: self.counters.processing.load(Ordering::SeqCst),
            processed: self.counters.processed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            cancelled: self.counters.cancelled.load(Ordering::SeqCst),
            capacity: self.config.queue_capacity.max(1),
            max_concurrent_jobs: self.config.max_concurrent_jobs.max(1),
        }
    }

    /// Stop intake, give accepted jobs `grace` to finish, then cancel the rest.
    ///
    /// Returns true when every accepted job finished within the grace period.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!("Shutting down queue manager, grace period {:?}", grace);
        self.intake.cancel();
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("All jobs finished before shutdown");
            return true;
        }

        warn!(
            "{} job(s) running and {} queued after grace period, cancelling",
            self.counters.processing.load(Ordering::SeqCst),
            self.counters.queued.load(Ordering::SeqCst)
        );
        self.cancel.cancel();
        self.tracker.wait().await;
        false
    }

    /// Start the background dispatcher
    fn start_dispatcher(
        &self,
        mut job_rx: mpsc::Receiver<ProcessingRequest>,
        audio_files: Arc<AudioFiles>,
        metrics: Metrics,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let intake = self.intake.clone();
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        let counters = self.counters.clone();

        self.tracker.spawn(async move {
            info!("Job dispatcher started");

            let mut draining = false;
            loop {
                // once intake stops nothing new can be reserved, so an empty
                // channel means every accepted upload has been dispatched
                let request = if draining {
                    match job_rx.try_recv() {
                        Ok(request) => request,
                        Err(_) => break,
                    }
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = intake.cancelled() => {
                            debug!("Intake stopped, draining queued jobs");
                            draining = true;
                            continue;
                        }
                        request = job_rx.recv() => match request {
                            Some(request) => request,
                            None => break,
                        },
                    }
                };

                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        Self::drop_queued(&counters, &request);
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            error!("Job semaphore closed, stopping dispatcher");
                            Self::drop_queued(&counters, &request);
                            break;
                        }
                    },
                };

                counters.queued.fetch_sub(1, Ordering::SeqCst);
                counters.processing.fetch_add(1, Ordering::SeqCst);
                Self::publish_gauges(&counters, &metrics).await;

                tracker.spawn(Self::run_job(
                    audio_files.clone(),
                    request,
                    permit,
                    cancel.clone(),
                    counters.clone(),
                    metrics.clone(),
                ));
            }

            job_rx.close();
            while let Ok(request) = job_rx.try_recv() {
                Self::drop_queued(&counters, &request);
            }
            Self::publish_gauges(&counters, &metrics).await;

            info!("Job dispatcher stopped");
        });
    }

    async fn run_job(
        audio_files: Arc<AudioFiles>,
        request: ProcessingRequest,
        _permit: OwnedSemaphorePermit,
        cancel: CancellationToken,
        counters: Arc<Counters>,
        metrics: Metrics,
    ) {
        let start_time = Instant::now();
        let ProcessingRequest {
            file,
            provider,
            audio,
        } = request;

        let outcome = audio_files
            .process(&file, provider.as_ref(), &audio, &cancel)
            .await;

        let label = match &outcome {
            Ok(job) => {
                counters.processed.fetch_add(1, Ordering::SeqCst);
                job.status.as_str()
            }
            Err(ProcessError::Cancelled) => {
                warn!("Processing of file {} cancelled", file.file_id);
                counters.cancelled.fetch_add(1, Ordering::SeqCst);
                "CANCELLED"
            }
            Err(e) => {
                error!("Processing of file {} failed: {}", file.file_id, e);
                counters.failed.fetch_add(1, Ordering::SeqCst);
                match e {
                    ProcessError::Adapter(_) => "INVALID",
                    _ => "STORE_ERROR",
                }
            }
        };

        metrics
            .record_job_completed(&file.asr, label, start_time.elapsed().as_secs_f64())
            .await;
        counters.processing.fetch_sub(1, Ordering::SeqCst);
        Self::publish_gauges(&counters, &metrics).await;
    }

    /// A queued request that will never start; its file keeps no job
    fn drop_queued(counters: &Counters, request: &ProcessingRequest) {
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        warn!(
            "Dropping queued file {} ({}) at shutdown",
            request.file.file_id, request.file.file_name
        );
    }

    async fn publish_gauges(counters: &Counters, metrics: &Metrics) {
        metrics
            .set_queue_size(counters.queued.load(Ordering::SeqCst))
            .await;
        metrics
            .set_jobs_processing(counters.processing.load(Ordering::SeqCst))
            .await;
    }
}
