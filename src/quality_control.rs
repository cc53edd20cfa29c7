// Transcription quality control
//
// Compares a human reference ("ideal") text with every transcript produced for a
// file and scores each provider by positional word agreement.

use log::info;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{QualityControlStore, StoreError};

/// Human-supplied reference text for one channel of a file
#[derive(Debug, Clone, Serialize)]
pub struct IdealText {
    pub id: Uuid,
    #[serde(rename = "id_file")]
    pub file_id: String,
    #[serde(rename = "channelTag")]
    pub channel_tag: String,
    pub text: String,
}

impl IdealText {
    pub fn new(file_id: String, channel_tag: String, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_id,
            channel_tag,
            text,
        }
    }
}

/// Raw transcript of one provider, as read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTranscript {
    pub asr: String,
    pub text: String,
}

/// Similarity of one provider's transcript to the reference.
///
/// Derived on every read, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct QualityScore {
    pub asr: String,
    #[serde(skip)]
    pub ideal_text: String,
    #[serde(skip)]
    pub asr_text: String,
    pub quality: f32,
}

/// Lower-case `text` and drop every character that is neither a letter nor whitespace.
///
/// Lower-casing runs first because it can expand a letter into a letter plus a
/// combining mark ('İ' becomes "i\u{307}"); the filter then removes the mark.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect()
}

/// Whitespace-separated words of an already normalized text
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Fraction of aligned positions holding the same word.
///
/// Only the first `min(len)` positions are compared, so an inserted or dropped
/// word shifts every following comparison. Either side being empty scores 0.
pub fn positional_similarity(reference: &str, candidate: &str) -> f32 {
    let reference = tokenize(reference);
    let candidate = tokenize(candidate);

    let min_len = reference.len().min(candidate.len());
    if min_len == 0 {
        return 0.0;
    }

    let matches = reference
        .iter()
        .zip(candidate.iter())
        .filter(|(r, c)| r == c)
        .count();

    matches as f32 / min_len as f32
}

/// Normalize both texts and compare them
pub fn score(ideal: &str, candidate: &str) -> f32 {
    positional_similarity(&normalize(ideal), &normalize(candidate))
}

/// Quality scoring service
pub struct QualityControls {
    store: Arc<dyn QualityControlStore>,
}

impl QualityControls {
    pub fn new(store: Arc<dyn QualityControlStore>) -> Self {
        Self { store }
    }

    /// Persist a reference text under a fresh identifier
    pub async fn record_ideal(
        &self,
        file_id: String,
        channel_tag: String,
        text: String,
    ) -> Result<IdealText, StoreError> {
        let ideal = IdealText::new(file_id, channel_tag, text);
        self.store.create_ideal(&ideal).await?;
        info!(
            "Ideal text {} recorded for file {} channel {}",
            ideal.id, ideal.file_id, ideal.channel_tag
        );
        Ok(ideal)
    }

    /// One score per provider transcript of the file.
    ///
    /// Empty when the file has no reference text yet.
    pub async fn score(&self, file_id: &str) -> Result<Vec<QualityScore>, StoreError> {
        let (transcripts, ideal) = self.store.get_transcripts_with_ideal(file_id).await?;
        let ideal = match ideal {
            Some(text) => normalize(&text),
            None => return Ok(Vec::new()),
        };

        Ok(transcripts
            .into_iter()
            .map(|t| {
                let asr_text = normalize(&t.text);
                QualityScore {
                    quality: positional_similarity(&ideal, &asr_text),
                    asr: t.asr,
                    ideal_text: ideal.clone(),
                    asr_text,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_files::{AsrJob, AudioFile, JobStatus, TranscriptResult};
    use crate::store::{AudioFileStore, InMemoryStore};

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(tokenize(&normalize("Hello, World!")), vec!["hello", "world"]);
        assert_eq!(tokenize(&normalize("hello world")), vec!["hello", "world"]);
        assert_eq!(normalize("Room 101: ÉTÉ"), "room  été");
    }

    #[test]
    fn test_normalize_drops_marks_produced_by_lowercasing() {
        assert_eq!(normalize("İstanbul"), "istanbul");
        assert!(approx_eq(score("İstanbul", "istanbul"), 1.0));
    }

    #[test]
    fn test_identical_text_scores_one() {
        assert!(approx_eq(score("the quick fox", "the quick fox"), 1.0));
        assert!(approx_eq(score("The quick, fox.", "the QUICK fox"), 1.0));
    }

    #[test]
    fn test_one_substitution() {
        assert!(approx_eq(score("the quick fox", "the slow fox"), 2.0 / 3.0));
    }

    #[test]
    fn test_empty_side_scores_zero() {
        assert_eq!(score("", "anything here"), 0.0);
        assert_eq!(score("anything here", ""), 0.0);
        assert_eq!(score("!!! 123", "words"), 0.0);
    }

    #[test]
    fn test_dropped_word_shifts_alignment() {
        // comparison covers only the shorter sequence
        assert!(approx_eq(score("a b c d", "a c d"), 1.0 / 3.0));
        assert!(approx_eq(score("a b", "a b c d"), 1.0));
    }

    async fn seeded_store() -> (Arc<InMemoryStore>, String) {
        let store = Arc::new(InMemoryStore::new());
        let file = AudioFile {
            file_id: "fp".to_string(),
            file_name: "a.wav".to_string(),
            asr: "x".to_string(),
            uploaded_at: chrono::Utc::now(),
            owner_id: "U".to_string(),
        };
        store.create_file(&file).await.unwrap();

        for (asr, text) in [("x", "The quick fox!"), ("y", "the slow fox")] {
            let job = AsrJob {
                id: Uuid::new_v4(),
                file_id: file.file_id.clone(),
                asr: asr.to_string(),
                status: JobStatus::New,
            };
            store.create_job(&job).await.unwrap();
            store
                .create_result(&TranscriptResult::single_channel(job.id, text.to_string()))
                .await
                .unwrap();
        }
        (store, file.file_id)
    }

    #[tokio::test]
    async fn test_score_per_provider() {
        let (store, file_id) = seeded_store().await;
        let qc = QualityControls::new(store);

        assert!(qc.score(&file_id).await.unwrap().is_empty());

        qc.record_ideal(file_id.clone(), "1".to_string(), "the quick fox".to_string())
            .await
            .unwrap();

        let scores = qc.score(&file_id).await.unwrap();
        assert_eq!(scores.len(), 2);
        let x = scores.iter().find(|s| s.asr == "x").unwrap();
        let y = scores.iter().find(|s| s.asr == "y").unwrap();
        assert!(approx_eq(x.quality, 1.0));
        assert!(approx_eq(y.quality, 2.0 / 3.0));
        assert_eq!(x.ideal_text, y.ideal_text);
        assert_eq!(x.asr_text, "the quick fox");
    }

    #[tokio::test]
    async fn test_second_ideal_for_channel_conflicts() {
        let (store, file_id) = seeded_store().await;
        let qc = QualityControls::new(store);

        qc.record_ideal(file_id.clone(), "1".to_string(), "one".to_string())
            .await
            .unwrap();
        let err = qc
            .record_ideal(file_id.clone(), "1".to_string(), "two".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        qc.record_ideal(file_id, "2".to_string(), "two".to_string())
            .await
            .unwrap();
    }
}
