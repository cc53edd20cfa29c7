// RecoBattle Library
//
// This crate accepts audio uploads, transcribes them through pluggable ASR
// providers in the background, and scores each provider's transcript against a
// human reference text.

pub mod asr;
pub mod audio_files;
pub mod config;
pub mod config_loader;
pub mod config_validator;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod quality_control;
pub mod queue_manager;
pub mod store;

// Re-export common types for easier access
pub use asr::{AsrError, AsrProvider, AsrRegistry};
pub use audio_files::{AsrJob, AudioFile, AudioFiles, JobStatus, ProcessError, TranscriptResult};
pub use config::AppConfig;
pub use error::HandlerError;
pub use fingerprint::Fingerprinter;
pub use metrics::Metrics;
pub use quality_control::{IdealText, QualityControls, QualityScore};
pub use queue_manager::{QueueError, QueueManager};
pub use store::{AudioFileStore, InMemoryStore, QualityControlStore, StoreError};
