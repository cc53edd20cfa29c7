// Speech recognition providers
//
// This module defines the capability every external ASR service is wrapped behind
// and the registry the upload path resolves providers from.

pub mod registry;
pub mod whisper_http;
pub mod yandex;

use async_trait::async_trait;
use thiserror::Error;

pub use registry::AsrRegistry;
pub use whisper_http::WhisperHttpProvider;
pub use yandex::YandexSpeechKit;

/// Default bound on a single recognition call
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Uniform contract for an external speech-to-text service.
///
/// Implementations are stateless apart from their configuration. A call either
/// yields the full transcript or an error; partial text is never returned.
#[async_trait]
pub trait AsrProvider: Send + Sync {
    async fn recognize(&self, audio: &[u8]) -> Result<String, AsrError>;
}

/// Errors raised by ASR adapters
#[derive(Error, Debug)]
pub enum AsrError {
    /// The upstream did not answer within the configured timeout
    #[error("ASR request timed out")]
    Timeout,

    /// The request could not be built or sent
    #[error("ASR request failed: {0}")]
    Request(String),

    /// The upstream answered with a non-2xx status
    #[error("ASR returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded
    #[error("Malformed ASR response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for AsrError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AsrError::Timeout
        } else if err.is_decode() {
            AsrError::MalformedResponse(err.to_string())
        } else {
            AsrError::Request(err.to_string())
        }
    }
}
