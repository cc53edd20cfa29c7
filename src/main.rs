use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;

use recobattle::asr::{AsrRegistry, WhisperHttpProvider, YandexSpeechKit};
use recobattle::config::{provider_names, AppConfig};
use recobattle::config_loader::load_config;
use recobattle::config_validator::ConfigValidator;
use recobattle::handlers::AppServices;
use recobattle::metrics::{create_metrics_exporter, Metrics};
use recobattle::{AudioFiles, Fingerprinter, InMemoryStore, QualityControls, QueueManager};

/// Register every provider whose configuration is present
async fn build_registry(config: &AppConfig) -> AsrRegistry {
    let registry = AsrRegistry::new();
    let timeout = config.processing.asr_timeout;

    if let Some(yandex) = &config.yandex {
        match YandexSpeechKit::new(yandex.clone(), timeout) {
            Ok(provider) => {
                registry
                    .register(provider_names::YANDEX, Arc::new(provider))
                    .await;
            }
            Err(e) => error!("SpeechKit adapter disabled: {}", e),
        }
    }

    if let Some(whisper) = &config.whisper {
        match WhisperHttpProvider::new(whisper.clone(), timeout) {
            Ok(provider) => {
                registry
                    .register(provider_names::WHISPER, Arc::new(provider))
                    .await;
            }
            Err(e) => error!("Whisper adapter disabled: {}", e),
        }
    }

    registry
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if !load_config() {
        info!("No configuration file loaded, using environment and defaults");
    }

    let config = match ConfigValidator::validate_and_load() {
        Ok(config) => config,
        Err(_) => {
            // details were logged by the validator
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid configuration",
            ));
        }
    };

    // Initialize metrics
    let metrics = Metrics::new(create_metrics_exporter(&config.metrics.exporter_type));

    let registry = build_registry(&config).await;
    let providers = registry.names().await;
    if providers.is_empty() {
        warn!("No ASR provider registered, uploads will be rejected");
    }

    let store = Arc::new(InMemoryStore::new());
    let audio_files = Arc::new(AudioFiles::new(
        store.clone(),
        Fingerprinter::new(config.fingerprint_secret.clone()),
    ));
    let quality_controls = QualityControls::new(store);
    let queue = web::Data::new(QueueManager::new(
        audio_files.clone(),
        config.processing.clone(),
        metrics.clone(),
    ));

    let services = AppServices {
        audio_files: web::Data::from(audio_files),
        quality_controls: web::Data::new(quality_controls),
        registry: web::Data::new(registry),
        queue: queue.clone(),
        server: web::Data::new(config.server.clone()),
        metrics: web::Data::new(metrics),
    };

    let server_config = &config.server;
    info!(
        "Starting RecoBattle server on http://{}:{}",
        server_config.host, server_config.port
    );
    info!("ASR providers: {:?}", providers);
    info!("Metrics exporter: {}", config.metrics.exporter_type);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| services.configure(cfg))
    })
    .keep_alive(server_config.keepalive);
    if server_config.workers > 0 {
        server = server.workers(server_config.workers);
    }

    // actix stops accepting on Ctrl-C and waits for open connections
    let result = server
        .bind((server_config.host, server_config.port))?
        .run()
        .await;

    let drained = queue.shutdown(config.processing.shutdown_grace).await;
    if !drained {
        warn!("Some jobs were cancelled before completion");
    }
    info!("RecoBattle server stopped");

    result
}
