// Persistence contracts
//
// The orchestrator and the scoring engine only talk to storage through these
// traits. A SQL backend lives outside this crate; `memory` is the in-process
// implementation used by the binary and the tests.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::audio_files::{AsrJob, AudioFile, AudioFileSummary, JobStatus, TranscriptResult};
use crate::quality_control::{IdealText, ProviderTranscript};

pub use memory::InMemoryStore;

/// Store error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint was violated
    #[error("{0}: already exists")]
    Conflict(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("Storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AudioFileStore: Send + Sync {
    /// Persist a new file record. Duplicate fingerprints yield `StoreError::Conflict`.
    async fn create_file(&self, file: &AudioFile) -> Result<(), StoreError>;

    async fn create_job(&self, job: &AsrJob) -> Result<(), StoreError>;

    async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError>;

    async fn create_result(&self, result: &TranscriptResult) -> Result<(), StoreError>;

    /// Files of one owner with their latest job, newest upload first
    async fn list_files(&self, owner_id: &str) -> Result<Vec<AudioFileSummary>, StoreError>;

    /// Every transcript produced for a file, across jobs and channels
    async fn list_results(&self, file_id: &str) -> Result<Vec<TranscriptResult>, StoreError>;
}

#[async_trait]
pub trait QualityControlStore: Send + Sync {
    /// Persist a reference text. A second text for the same file and channel
    /// yields `StoreError::Conflict`.
    async fn create_ideal(&self, ideal: &IdealText) -> Result<(), StoreError>;

    /// All provider transcripts of a file together with its reference text.
    /// The reference is `None` when none was recorded.
    async fn get_transcripts_with_ideal(
        &self,
        file_id: &str,
    ) -> Result<(Vec<ProviderTranscript>, Option<String>), StoreError>;
}
