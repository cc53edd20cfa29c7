//! Audio file ingestion and ASR processing
//!
//! `AudioFiles` creates file records and drives one ASR job through its
//! lifecycle:
//!
//! ```text
//! NEW -> PROCESSING -> PROCESSED
//!                   -> INVALID
//! ```
//!
//! Every step persists before the next one starts and each job receives exactly
//! one terminal status write. A failure before that write leaves the job in its
//! last persisted status; nothing is retried or rolled back.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::asr::{AsrError, AsrProvider};
use crate::fingerprint::Fingerprinter;
use crate::store::{AudioFileStore, StoreError};

/// Channel tag used when the audio is treated as a single channel
pub const DEFAULT_CHANNEL_TAG: &str = "1";

/// Lifecycle status of an ASR job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    New,
    Processing,
    Processed,
    Invalid,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Processed => "PROCESSED",
            JobStatus::Invalid => "INVALID",
        }
    }

    /// `PROCESSED` and `INVALID` are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Invalid)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(JobStatus::New),
            "PROCESSING" => Ok(JobStatus::Processing),
            "PROCESSED" => Ok(JobStatus::Processed),
            "INVALID" => Ok(JobStatus::Invalid),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uploaded audio file record
#[derive(Debug, Clone, Serialize)]
pub struct AudioFile {
    /// Fingerprint, primary key
    #[serde(rename = "id_file")]
    pub file_id: String,
    pub file_name: String,
    /// Provider selected at upload
    pub asr: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub owner_id: String,
}

impl AudioFile {
    /// A record with an empty fingerprint; `AudioFiles::create` assigns it
    pub fn new(file_name: String, asr: String, owner_id: String) -> Self {
        Self {
            file_id: String::new(),
            file_name,
            asr,
            uploaded_at: Utc::now(),
            owner_id,
        }
    }
}

/// One processing attempt for a file
#[derive(Debug, Clone, Serialize)]
pub struct AsrJob {
    pub id: Uuid,
    #[serde(rename = "id_file")]
    pub file_id: String,
    pub asr: String,
    pub status: JobStatus,
}

/// Recognized text for one channel of a job
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    #[serde(skip)]
    pub job_id: Uuid,
    #[serde(rename = "channelTag")]
    pub channel_tag: String,
    pub text: String,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f32>,
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f32>,
}

impl TranscriptResult {
    pub fn single_channel(job_id: Uuid, text: String) -> Self {
        Self {
            job_id,
            channel_tag: DEFAULT_CHANNEL_TAG.to_string(),
            text,
            start_time: None,
            end_time: None,
        }
    }
}

/// File listing row: the file joined with its latest job
#[derive(Debug, Clone, Serialize)]
pub struct AudioFileSummary {
    #[serde(rename = "id_file")]
    pub file_id: String,
    pub file_name: String,
    pub asr: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: Option<JobStatus>,
}

/// Failures of a processing run
#[derive(Error, Debug)]
pub enum ProcessError {
    /// A store write failed; the job keeps its last persisted status
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The provider failed; the job was marked INVALID
    #[error("ASR error: {0}")]
    Adapter(#[from] AsrError),

    /// Shutdown was requested while the job was in flight
    #[error("Processing cancelled")]
    Cancelled,
}

/// Ingestion and processing orchestrator
pub struct AudioFiles {
    store: Arc<dyn AudioFileStore>,
    fingerprinter: Fingerprinter,
}

impl AudioFiles {
    pub fn new(store: Arc<dyn AudioFileStore>, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter,
        }
    }

    /// Assign the fingerprint and persist the file record.
    ///
    /// Returns the fingerprint. A second upload of the same filename by the same
    /// owner fails with `StoreError::Conflict` and leaves the first record as is.
    pub async fn create(&self, file: &mut AudioFile) -> Result<String, StoreError> {
        file.file_id = self.fingerprinter.fingerprint(&file.file_name, &file.owner_id);
        self.store.create_file(file).await?;
        info!(
            "Audio file {} ({}) created for provider {}",
            file.file_id, file.file_name, file.asr
        );
        Ok(file.file_id.clone())
    }

    /// Run one ASR job for `file`.
    ///
    /// `cancel` is checked at every store write and around the provider call.
    /// On success the job ends `PROCESSED`; a provider or result-write failure
    /// ends it `INVALID`.
    pub async fn process(
        &self,
        file: &AudioFile,
        provider: &dyn AsrProvider,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> Result<AsrJob, ProcessError> {
        let mut job = AsrJob {
            id: Uuid::new_v4(),
            file_id: file.file_id.clone(),
            asr: file.asr.clone(),
            status: JobStatus::New,
        };

        guarded(cancel, self.store.create_job(&job)).await?;
        debug!("Job {} created for file {}", job.id, file.file_id);

        self.set_status(&mut job, JobStatus::Processing, cancel).await?;

        let text = match guarded(cancel, provider.recognize(audio)).await {
            Ok(text) => text,
            Err(ProcessError::Adapter(e)) => {
                error!("Job {}: ASR {} failed: {}", job.id, job.asr, e);
                self.set_status(&mut job, JobStatus::Invalid, cancel).await?;
                return Err(ProcessError::Adapter(e));
            }
            Err(e) => return Err(e),
        };

        let result = TranscriptResult::single_channel(job.id, text);
        match guarded(cancel, self.store.create_result(&result)).await {
            Ok(()) => {}
            Err(ProcessError::Persistence(e)) => {
                error!("Job {}: failed to store transcript: {}", job.id, e);
                self.set_status(&mut job, JobStatus::Invalid, cancel).await?;
                return Err(ProcessError::Persistence(e));
            }
            Err(e) => return Err(e),
        }

        self.set_status(&mut job, JobStatus::Processed, cancel).await?;
        info!("Job {} for file {} processed", job.id, file.file_id);
        Ok(job)
    }

    /// Files uploaded by `owner_id`, newest first
    pub async fn list_files(&self, owner_id: &str) -> Result<Vec<AudioFileSummary>, StoreError> {
        self.store.list_files(owner_id).await
    }

    /// Every transcript recorded for a file
    pub async fn get_transcripts(&self, file_id: &str) -> Result<Vec<TranscriptResult>, StoreError> {
        self.store.list_results(file_id).await
    }

    async fn set_status(
        &self,
        job: &mut AsrJob,
        status: JobStatus,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        if let Err(e) = guarded(cancel, self.store.update_job_status(job.id, status)).await {
            warn!(
                "Job {}: could not move from {} to {}: {}",
                job.id, job.status, status, e
            );
            return Err(e);
        }
        debug!("Job {}: {} -> {}", job.id, job.status, status);
        job.status = status;
        Ok(())
    }
}

/// Await `fut` unless `cancel` fires first
async fn guarded<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, ProcessError>
where
    F: Future<Output = Result<T, E>>,
    ProcessError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProcessError::Cancelled),
        out = fut => out.map_err(ProcessError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedText(&'static str);

    #[async_trait]
    impl AsrProvider for FixedText {
        async fn recognize(&self, _audio: &[u8]) -> Result<String, AsrError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AsrProvider for FailingProvider {
        async fn recognize(&self, _audio: &[u8]) -> Result<String, AsrError> {
            Err(AsrError::Timeout)
        }
    }

    struct PendingProvider;

    #[async_trait]
    impl AsrProvider for PendingProvider {
        async fn recognize(&self, _audio: &[u8]) -> Result<String, AsrError> {
            futures::future::pending().await
        }
    }

    /// Wraps the in-memory store, records status writes and can fail result writes
    struct RecordingStore {
        inner: InMemoryStore,
        fail_results: bool,
        statuses: Mutex<Vec<JobStatus>>,
    }

    impl RecordingStore {
        fn new(fail_results: bool) -> Self {
            Self {
                inner: InMemoryStore::new(),
                fail_results,
                statuses: Mutex::new(Vec::new()),
            }
        }

        fn status_writes(&self) -> Vec<JobStatus> {
            self.statuses.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioFileStore for RecordingStore {
        async fn create_file(&self, file: &AudioFile) -> Result<(), StoreError> {
            self.inner.create_file(file).await
        }

        async fn create_job(&self, job: &AsrJob) -> Result<(), StoreError> {
            self.inner.create_job(job).await
        }

        async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError> {
            self.statuses.lock().unwrap().push(status);
            self.inner.update_job_status(job_id, status).await
        }

        async fn create_result(&self, result: &TranscriptResult) -> Result<(), StoreError> {
            if self.fail_results {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.create_result(result).await
        }

        async fn list_files(&self, owner_id: &str) -> Result<Vec<AudioFileSummary>, StoreError> {
            self.inner.list_files(owner_id).await
        }

        async fn list_results(&self, file_id: &str) -> Result<Vec<TranscriptResult>, StoreError> {
            self.inner.list_results(file_id).await
        }
    }

    async fn setup(fail_results: bool) -> (Arc<RecordingStore>, AudioFiles, AudioFile) {
        let store = Arc::new(RecordingStore::new(fail_results));
        let app = AudioFiles::new(store.clone(), Fingerprinter::new("test-secret"));
        let mut file = AudioFile::new("a.wav".to_string(), "x".to_string(), "U".to_string());
        app.create(&mut file).await.unwrap();
        (store, app, file)
    }

    fn terminal_writes(writes: &[JobStatus]) -> usize {
        writes.iter().filter(|s| s.is_terminal()).count()
    }

    #[tokio::test]
    async fn test_successful_processing() {
        let (store, app, file) = setup(false).await;
        let cancel = CancellationToken::new();

        let job = app
            .process(&file, &FixedText("hi there"), b"RIFF", &cancel)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Processed);
        assert_eq!(store.inner.job_status(job.id).await, Some(JobStatus::Processed));
        assert_eq!(
            store.status_writes(),
            vec![JobStatus::Processing, JobStatus::Processed]
        );

        let results = app.get_transcripts(&file.file_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "hi there");
        assert_eq!(results[0].channel_tag, "1");
    }

    #[tokio::test]
    async fn test_adapter_failure_marks_invalid_without_result() {
        let (store, app, file) = setup(false).await;
        let cancel = CancellationToken::new();

        let err = app
            .process(&file, &FailingProvider, b"RIFF", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Adapter(AsrError::Timeout)));

        let jobs = store.inner.jobs_for_file(&file.file_id).await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Invalid);
        assert_eq!(terminal_writes(&store.status_writes()), 1);
        assert!(app.get_transcripts(&file.file_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_write_failure_marks_invalid() {
        let (store, app, file) = setup(true).await;
        let cancel = CancellationToken::new();

        let err = app
            .process(&file, &FixedText("hi there"), b"RIFF", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Persistence(StoreError::Backend(_))));

        let jobs = store.inner.jobs_for_file(&file.file_id).await;
        assert_eq!(jobs[0].status, JobStatus::Invalid);
        assert_eq!(
            store.status_writes(),
            vec![JobStatus::Processing, JobStatus::Invalid]
        );
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_conflict() {
        let (_store, app, file) = setup(false).await;

        let mut again = AudioFile::new("a.wav".to_string(), "y".to_string(), "U".to_string());
        let err = app.create(&mut again).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let listed = app.list_files("U").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_id, file.file_id);
        assert_eq!(listed[0].asr, "x");
    }

    #[tokio::test]
    async fn test_same_name_other_owner_is_allowed() {
        let (_store, app, file) = setup(false).await;

        let mut other = AudioFile::new("a.wav".to_string(), "x".to_string(), "V".to_string());
        let id = app.create(&mut other).await.unwrap();
        assert_ne!(id, file.file_id);
    }

    #[tokio::test]
    async fn test_cancel_during_recognition_leaves_processing() {
        let (store, app, file) = setup(false).await;
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = app
            .process(&file, &PendingProvider, b"RIFF", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Cancelled));

        let jobs = store.inner.jobs_for_file(&file.file_id).await;
        assert_eq!(jobs[0].status, JobStatus::Processing);
        assert_eq!(terminal_writes(&store.status_writes()), 0);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            JobStatus::New,
            JobStatus::Processing,
            JobStatus::Processed,
            JobStatus::Invalid,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("DONE".parse::<JobStatus>().is_err());
    }
}
