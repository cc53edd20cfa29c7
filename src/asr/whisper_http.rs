// OpenAI-compatible transcription adapter
//
// Works against any server exposing `POST {base_url}/audio/transcriptions`
// (OpenAI, faster-whisper-server, whisper.cpp server, ...).

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::multipart;
use std::time::Duration;

use super::{AsrError, AsrProvider};
use crate::config::WhisperAsrConfig;

pub struct WhisperHttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperHttpProvider {
    pub fn new(config: WhisperAsrConfig, timeout: Duration) -> Result<Self, AsrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AsrError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        })
    }
}

#[async_trait]
impl AsrProvider for WhisperHttpProvider {
    async fn recognize(&self, audio: &[u8]) -> Result<String, AsrError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| AsrError::Request(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", file_part);

        debug!("Sending {} bytes to {} (model {})", audio.len(), url, self.model);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!("Transcription server returned {}: {}", status, body);
            return Err(AsrError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let transcript = response.text().await?;
        info!("Whisper transcription completed ({} chars)", transcript.len());

        Ok(transcript.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    async fn transcriptions(req: HttpRequest) -> HttpResponse {
        match req.headers().get("Authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer key") => HttpResponse::Ok().body("  the quick fox\n"),
            _ => HttpResponse::Unauthorized().body("missing key"),
        }
    }

    fn start_mock_server() -> (String, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(|| {
            App::new().route("/v1/audio/transcriptions", web::post().to(transcriptions))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock server");
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}/v1/", addr), handle)
    }

    fn provider(url: String, api_key: Option<&str>) -> WhisperHttpProvider {
        WhisperHttpProvider::new(
            WhisperAsrConfig {
                url,
                api_key: api_key.map(str::to_string),
                model: "whisper-1".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_transcript_is_trimmed() {
        let (url, handle) = start_mock_server();
        let text = provider(url, Some("key")).recognize(b"audio").await.unwrap();
        assert_eq!(text, "the quick fox");
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_rejected_request_is_status_error() {
        let (url, handle) = start_mock_server();
        let result = provider(url, None).recognize(b"audio").await;
        assert!(matches!(result, Err(AsrError::Status { status: 401, .. })));
        handle.stop(true).await;
    }
}
