// API route handlers for RecoBattle
//
// Thin HTTP layer over the audio file orchestrator, the scoring service and the
// processing queue.

use actix_multipart::Multipart;
use actix_web::{get, post, web, HttpResponse, ResponseError};
use log::{error, info};
use std::time::Instant;

use crate::asr::AsrRegistry;
use crate::audio_files::{AudioFile, AudioFiles};
use crate::config::ServerConfig;
use crate::error::HandlerError;
use crate::handlers::authentication::OwnerId;
use crate::handlers::form::extract_upload_form;
use crate::metrics::Metrics;
use crate::models::{IdealTextRequest, IdealTextResponse, StatusResponse, UploadResponse};
use crate::quality_control::QualityControls;
use crate::queue_manager::{ProcessingRequest, QueueManager};

/// Register the owner-scoped API routes
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        HandlerError::form_error(format!("Invalid JSON body: {}", err)).into()
    }))
    .service(upload_audio_file)
    .service(list_audio_files)
    .service(get_transcripts)
    .service(record_ideal_text)
    .service(quality_scores);
}

/// Record duration and status of a finished request
async fn observe(
    metrics: &Metrics,
    endpoint: &str,
    method: &str,
    start_time: Instant,
    result: Result<HttpResponse, HandlerError>,
) -> Result<HttpResponse, HandlerError> {
    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status_code(),
    };
    metrics
        .record_http_request(
            endpoint,
            method,
            status.as_str(),
            start_time.elapsed().as_secs_f64(),
        )
        .await;
    result
}

/// 204 for an empty list, 200 with the list otherwise
fn list_response<T: serde::Serialize>(items: Vec<T>) -> HttpResponse {
    if items.is_empty() {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::Ok().json(items)
    }
}

/// Handler for audio uploads
///
/// Resolves the provider, reserves a queue slot, records the file and hands the
/// audio to the background queue. Responds 202 before recognition starts.
#[post("/asr/audiofile")]
pub async fn upload_audio_file(
    owner: OwnerId,
    form: Multipart,
    audio_files: web::Data<AudioFiles>,
    registry: web::Data<AsrRegistry>,
    queue: web::Data<QueueManager>,
    server: web::Data<ServerConfig>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = accept_upload(owner, form, &audio_files, &registry, &queue, &server, &metrics).await;
    observe(&metrics, "/api/asr/audiofile", "POST", start_time, result).await
}

async fn accept_upload(
    owner: OwnerId,
    form: Multipart,
    audio_files: &AudioFiles,
    registry: &AsrRegistry,
    queue: &QueueManager,
    server: &ServerConfig,
    metrics: &Metrics,
) -> Result<HttpResponse, HandlerError> {
    let upload = extract_upload_form(form, server.max_file_size).await?;

    let provider = match registry.lookup(&upload.asr).await {
        Some(provider) => provider,
        None => {
            info!("Upload of {} rejected: unknown provider {}", upload.file_name, upload.asr);
            metrics.record_upload(&upload.asr, "unknown_provider").await;
            return Err(HandlerError::UnknownProvider(upload.asr));
        }
    };

    let slot = match queue.try_reserve() {
        Ok(slot) => slot,
        Err(e) => {
            metrics.record_upload(&upload.asr, "queue_full").await;
            return Err(e.into());
        }
    };

    let mut file = AudioFile::new(upload.file_name, upload.asr, owner.0);
    let file_id = match audio_files.create(&mut file).await {
        Ok(file_id) => file_id,
        Err(e) => {
            info!("Upload of {} rejected: {}", file.file_name, e);
            metrics.record_upload(&file.asr, "rejected").await;
            return Err(e.into());
        }
    };

    metrics.record_upload(&file.asr, "accepted").await;
    slot.submit(ProcessingRequest {
        file,
        provider,
        audio: upload.audio,
    });

    Ok(HttpResponse::Accepted().json(UploadResponse {
        files_url: format!("/api/asr/textfile/{}", file_id),
        file_id,
    }))
}

/// Files uploaded by the caller, newest first
#[get("/asr/audiofiles")]
pub async fn list_audio_files(
    owner: OwnerId,
    audio_files: web::Data<AudioFiles>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = audio_files
        .list_files(owner.as_str())
        .await
        .map(list_response)
        .map_err(HandlerError::from);
    observe(&metrics, "/api/asr/audiofiles", "GET", start_time, result).await
}

/// Transcripts recorded for a file
#[get("/asr/textfile/{file_id}")]
pub async fn get_transcripts(
    path: web::Path<String>,
    audio_files: web::Data<AudioFiles>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = audio_files
        .get_transcripts(&path.into_inner())
        .await
        .map(list_response)
        .map_err(HandlerError::from);
    observe(&metrics, "/api/asr/textfile", "GET", start_time, result).await
}

/// Store the reference text of one channel of a file
#[post("/qualitycontrol/ideal")]
pub async fn record_ideal_text(
    body: web::Json<IdealTextRequest>,
    quality_controls: web::Data<QualityControls>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let request = body.into_inner();

    let result = store_ideal_text(request, &quality_controls).await;

    let outcome = match &result {
        Ok(_) => "created",
        Err(HandlerError::Conflict) => "conflict",
        Err(_) => "rejected",
    };
    metrics.record_ideal_text(outcome).await;
    observe(&metrics, "/api/qualitycontrol/ideal", "POST", start_time, result).await
}

async fn store_ideal_text(
    request: IdealTextRequest,
    quality_controls: &QualityControls,
) -> Result<HttpResponse, HandlerError> {
    if request.id_file.trim().is_empty() {
        return Err(HandlerError::MissingField("id_file"));
    }
    if request.channel_tag.trim().is_empty() {
        return Err(HandlerError::MissingField("channelTag"));
    }
    if request.text.trim().is_empty() {
        return Err(HandlerError::MissingField("text"));
    }

    let ideal = quality_controls
        .record_ideal(request.id_file, request.channel_tag, request.text)
        .await?;
    Ok(HttpResponse::Created().json(IdealTextResponse { id: ideal.id }))
}

/// One quality score per provider transcript of a file
#[get("/qualitycontrol/{file_id}")]
pub async fn quality_scores(
    path: web::Path<String>,
    quality_controls: web::Data<QualityControls>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = quality_controls
        .score(&path.into_inner())
        .await
        .map(list_response)
        .map_err(HandlerError::from);
    observe(&metrics, "/api/qualitycontrol", "GET", start_time, result).await
}

/// Registered providers and queue counters
#[get("/status")]
pub async fn service_status(
    registry: web::Data<AsrRegistry>,
    queue: web::Data<QueueManager>,
) -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        providers: registry.names().await,
        queue: queue.stats(),
    })
}

/// Metrics endpoint handler
#[get("/metrics")]
pub async fn metrics_endpoint(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.export().await {
        Ok(data) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(data),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            HandlerError::Internal(e).error_response()
        }
    }
}
