// Yandex SpeechKit adapter
//
// Sends raw audio to the SpeechKit short-audio recognition endpoint and returns
// the `result` field of the JSON answer.

use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use std::time::Duration;

use super::{AsrError, AsrProvider};
use crate::config::YandexAsrConfig;

/// Recognition topic sent with every request
const TOPIC: &str = "general";

#[derive(Deserialize)]
struct RecognitionResponse {
    result: String,
}

/// SpeechKit client holding endpoint configuration and a pooled HTTP client
pub struct YandexSpeechKit {
    config: YandexAsrConfig,
    client: reqwest::Client,
}

impl YandexSpeechKit {
    /// Build the adapter. Every request is bounded by `timeout`.
    pub fn new(config: YandexAsrConfig, timeout: Duration) -> Result<Self, AsrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AsrError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AsrProvider for YandexSpeechKit {
    async fn recognize(&self, audio: &[u8]) -> Result<String, AsrError> {
        debug!(
            "SpeechKit request to {} ({} bytes, format {}, {} Hz)",
            self.config.uri,
            audio.len(),
            self.config.format,
            self.config.sample_rate_hertz
        );

        let response = self
            .client
            .post(&self.config.uri)
            .query(&[
                ("topic", TOPIC),
                ("folderId", self.config.folder_id.as_str()),
                ("lang", self.config.language.as_str()),
                ("format", self.config.format.as_str()),
                ("sampleRateHertz", self.config.sample_rate_hertz.as_str()),
            ])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Api-Key {}", self.config.api_key),
            )
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                error!("SpeechKit request failed: {}", e);
                AsrError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!("SpeechKit returned {}: {}", status, body);
            return Err(AsrError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let parsed: RecognitionResponse = serde_json::from_slice(&body).map_err(|e| {
            error!("Failed to decode SpeechKit response: {}", e);
            AsrError::MalformedResponse(e.to_string())
        })?;

        info!("SpeechKit recognized {} characters", parsed.result.len());
        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    fn config(uri: String) -> YandexAsrConfig {
        YandexAsrConfig {
            uri,
            folder_id: "folder".to_string(),
            api_key: "secret".to_string(),
            format: "lpcm".to_string(),
            sample_rate_hertz: "48000".to_string(),
            language: "ru-RU".to_string(),
        }
    }

    async fn recognize_handler(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let authorized = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Api-Key secret");
        let query_ok = req.query_string().contains("folderId=folder")
            && req.query_string().contains("topic=general");
        if !authorized || !query_ok {
            return HttpResponse::Unauthorized().finish();
        }
        match body.as_ref() {
            b"garbage" => HttpResponse::Ok().body("not json"),
            b"fail" => HttpResponse::InternalServerError().body("boom"),
            b"slow" => {
                actix_web::rt::time::sleep(Duration::from_secs(2)).await;
                HttpResponse::Ok().json(serde_json::json!({ "result": "late" }))
            }
            _ => HttpResponse::Ok().json(serde_json::json!({ "result": "hi there" })),
        }
    }

    fn start_mock_speechkit() -> (String, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(|| {
            App::new().route("/recognize", web::post().to(recognize_handler))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock server");
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}/recognize", addr), handle)
    }

    #[actix_web::test]
    async fn test_recognize_returns_result_field() {
        let (uri, handle) = start_mock_speechkit();
        let provider = YandexSpeechKit::new(config(uri), Duration::from_secs(5)).unwrap();

        let text = provider.recognize(b"audio").await.unwrap();
        assert_eq!(text, "hi there");
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_non_success_status_is_error() {
        let (uri, handle) = start_mock_speechkit();
        let provider = YandexSpeechKit::new(config(uri), Duration::from_secs(5)).unwrap();

        let result = provider.recognize(b"fail").await;
        assert!(matches!(result, Err(AsrError::Status { status: 500, .. })));
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_malformed_body_is_error() {
        let (uri, handle) = start_mock_speechkit();
        let provider = YandexSpeechKit::new(config(uri), Duration::from_secs(5)).unwrap();

        let result = provider.recognize(b"garbage").await;
        assert!(matches!(result, Err(AsrError::MalformedResponse(_))));
        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_stalled_upstream_times_out() {
        let (uri, handle) = start_mock_speechkit();
        let provider = YandexSpeechKit::new(config(uri), Duration::from_millis(200)).unwrap();

        let result = provider.recognize(b"slow").await;
        assert!(matches!(result, Err(AsrError::Timeout)));
        handle.stop(false).await;
    }
}
