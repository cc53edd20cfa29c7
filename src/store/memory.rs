//! In-memory store
//!
//! Keeps every table in a single state struct behind one async mutex, so each
//! operation is atomic with respect to the others.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AudioFileStore, QualityControlStore, StoreError};
use crate::audio_files::{AsrJob, AudioFile, AudioFileSummary, JobStatus, TranscriptResult};
use crate::quality_control::{IdealText, ProviderTranscript};

#[derive(Default)]
struct StoreState {
    /// Files by fingerprint
    files: HashMap<String, AudioFile>,
    /// Insertion sequence per fingerprint, breaks ties between equal timestamps
    file_seq: HashMap<String, u64>,
    /// Jobs in creation order
    jobs: Vec<AsrJob>,
    results: Vec<TranscriptResult>,
    /// Reference texts in creation order
    ideals: Vec<IdealText>,
    next_seq: u64,
}

/// Store backed by process memory; contents are lost on restart
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of a job, if it exists
    pub async fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        let state = self.state.lock().await;
        state.jobs.iter().find(|j| j.id == job_id).map(|j| j.status)
    }

    /// Jobs created for a file, oldest first
    pub async fn jobs_for_file(&self, file_id: &str) -> Vec<AsrJob> {
        let state = self.state.lock().await;
        state
            .jobs
            .iter()
            .filter(|j| j.file_id == file_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AudioFileStore for InMemoryStore {
    async fn create_file(&self, file: &AudioFile) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.files.contains_key(&file.file_id) {
            return Err(StoreError::Conflict(format!("audio file {}", file.file_id)));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.file_seq.insert(file.file_id.clone(), seq);
        state.files.insert(file.file_id.clone(), file.clone());
        Ok(())
    }

    async fn create_job(&self, job: &AsrJob) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&job.file_id) {
            return Err(StoreError::NotFound(format!("audio file {}", job.file_id)));
        }
        if state.jobs.iter().any(|j| j.id == job.id) {
            return Err(StoreError::Conflict(format!("job {}", job.id)));
        }
        state.jobs.push(job.clone());
        Ok(())
    }

    async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) => {
                job.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("job {}", job_id))),
        }
    }

    async fn create_result(&self, result: &TranscriptResult) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.jobs.iter().any(|j| j.id == result.job_id) {
            return Err(StoreError::NotFound(format!("job {}", result.job_id)));
        }
        state.results.push(result.clone());
        Ok(())
    }

    async fn list_files(&self, owner_id: &str) -> Result<Vec<AudioFileSummary>, StoreError> {
        let state = self.state.lock().await;

        let mut owned: Vec<&AudioFile> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| {
            let seq_a = state.file_seq.get(&a.file_id);
            let seq_b = state.file_seq.get(&b.file_id);
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| seq_b.cmp(&seq_a))
        });

        Ok(owned
            .into_iter()
            .map(|file| {
                let latest_job = state.jobs.iter().rev().find(|j| j.file_id == file.file_id);
                AudioFileSummary {
                    file_id: file.file_id.clone(),
                    file_name: file.file_name.clone(),
                    asr: file.asr.clone(),
                    uploaded_at: file.uploaded_at,
                    job_id: latest_job.map(|j| j.id),
                    status: latest_job.map(|j| j.status),
                }
            })
            .collect())
    }

    async fn list_results(&self, file_id: &str) -> Result<Vec<TranscriptResult>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .results
            .iter()
            .filter(|r| {
                state
                    .jobs
                    .iter()
                    .any(|j| j.id == r.job_id && j.file_id == file_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QualityControlStore for InMemoryStore {
    async fn create_ideal(&self, ideal: &IdealText) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&ideal.file_id) {
            return Err(StoreError::NotFound(format!("audio file {}", ideal.file_id)));
        }
        if state
            .ideals
            .iter()
            .any(|i| i.file_id == ideal.file_id && i.channel_tag == ideal.channel_tag)
        {
            return Err(StoreError::Conflict(format!(
                "ideal text for {} channel {}",
                ideal.file_id, ideal.channel_tag
            )));
        }
        state.ideals.push(ideal.clone());
        Ok(())
    }

    async fn get_transcripts_with_ideal(
        &self,
        file_id: &str,
    ) -> Result<(Vec<ProviderTranscript>, Option<String>), StoreError> {
        let guard = self.state.lock().await;
        let state = &*guard;

        let ideal = match state.ideals.iter().find(|i| i.file_id == file_id) {
            Some(ideal) => ideal.text.clone(),
            None => return Ok((Vec::new(), None)),
        };

        let transcripts = state
            .jobs
            .iter()
            .filter(|j| j.file_id == file_id)
            .flat_map(|job| {
                state
                    .results
                    .iter()
                    .filter(move |r| r.job_id == job.id)
                    .map(move |r| ProviderTranscript {
                        asr: job.asr.clone(),
                        text: r.text.clone(),
                    })
            })
            .collect();

        Ok((transcripts, Some(ideal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn file(name: &str, owner: &str, minutes_ago: i64) -> AudioFile {
        AudioFile {
            file_id: format!("{}-{}", owner, name),
            file_name: name.to_string(),
            asr: "x".to_string(),
            uploaded_at: Utc::now() - Duration::minutes(minutes_ago),
            owner_id: owner.to_string(),
        }
    }

    fn job(file_id: &str) -> AsrJob {
        AsrJob {
            id: Uuid::new_v4(),
            file_id: file_id.to_string(),
            asr: "x".to_string(),
            status: JobStatus::New,
        }
    }

    #[tokio::test]
    async fn test_duplicate_file_is_conflict() {
        let store = InMemoryStore::new();
        let f = file("a.wav", "u", 0);
        store.create_file(&f).await.unwrap();

        let err = store.create_file(&f).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_files_newest_first_with_latest_job() {
        let store = InMemoryStore::new();
        let old = file("old.wav", "u", 10);
        let new = file("new.wav", "u", 1);
        store.create_file(&old).await.unwrap();
        store.create_file(&new).await.unwrap();
        store.create_file(&file("other.wav", "v", 0)).await.unwrap();

        let first = job(&old.file_id);
        let second = job(&old.file_id);
        store.create_job(&first).await.unwrap();
        store.create_job(&second).await.unwrap();
        store
            .update_job_status(second.id, JobStatus::Processed)
            .await
            .unwrap();

        let listed = store.list_files("u").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].file_name, "new.wav");
        assert_eq!(listed[0].status, None);
        assert_eq!(listed[1].job_id, Some(second.id));
        assert_eq!(listed[1].status, Some(JobStatus::Processed));
    }

    #[tokio::test]
    async fn test_result_requires_job() {
        let store = InMemoryStore::new();
        let result = TranscriptResult::single_channel(Uuid::new_v4(), "text".to_string());
        assert!(matches!(
            store.create_result(&result).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transcripts_with_ideal() {
        let store = InMemoryStore::new();
        let f = file("a.wav", "u", 0);
        store.create_file(&f).await.unwrap();

        let (transcripts, ideal) = store.get_transcripts_with_ideal(&f.file_id).await.unwrap();
        assert!(transcripts.is_empty());
        assert!(ideal.is_none());

        let j = job(&f.file_id);
        store.create_job(&j).await.unwrap();
        store
            .create_result(&TranscriptResult::single_channel(j.id, "hello".to_string()))
            .await
            .unwrap();
        let ideal_text = IdealText::new(f.file_id.clone(), "1".to_string(), "hello".to_string());
        store.create_ideal(&ideal_text).await.unwrap();

        let (transcripts, ideal) = store.get_transcripts_with_ideal(&f.file_id).await.unwrap();
        assert_eq!(ideal.as_deref(), Some("hello"));
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].asr, "x");

        let again = IdealText::new(f.file_id.clone(), "1".to_string(), "other".to_string());
        assert!(matches!(
            store.create_ideal(&again).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
