// RecoBattle data models
//
// Request and response bodies of the HTTP API. Domain records serialize
// themselves and are returned as they are.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::queue_manager::QueueStats;

/// Response for an accepted upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Fingerprint assigned to the file
    pub file_id: String,
    /// Where the transcripts will appear
    pub files_url: String,
}

/// Reference text submitted for scoring
#[derive(Debug, Deserialize)]
pub struct IdealTextRequest {
    pub id_file: String,
    #[serde(rename = "channelTag")]
    pub channel_tag: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdealTextResponse {
    pub id: Uuid,
}

/// Error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Service status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Registered provider names, sorted
    pub providers: Vec<String>,
    pub queue: QueueStats,
}
