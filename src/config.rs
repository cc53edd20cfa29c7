// RecoBattle configuration
//
// This module contains the configuration structures and their defaults.
// Values are read from the environment by `config_validator`, after
// `config_loader` has merged the optional configuration file into it.

use std::net::IpAddr;
use std::time::Duration;

/// Default values for configuration
pub mod defaults {
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 8080;
    pub const KEEPALIVE_SECONDS: u64 = 75;

    // 0 lets actix pick one worker per core
    pub const HTTP_WORKER_NUMBER: usize = 0;

    // 64MB
    pub const MAX_FILE_SIZE: usize = 67_108_864;

    pub const ENABLE_AUTHORIZATION: bool = true;

    pub const FINGERPRINT_SECRET: &str = "recobattle-dev-secret";

    pub const JOB_QUEUE_CAPACITY: usize = 100;
    pub const SHUTDOWN_GRACE_SECONDS: u64 = 30;
    pub const ASR_REQUEST_TIMEOUT_SECONDS: u64 = crate::asr::DEFAULT_REQUEST_TIMEOUT_SECS;

    pub const YANDEX_ASR_URI: &str = "https://stt.api.cloud.yandex.net/speech/v1/stt:recognize";
    pub const YANDEX_AUDIO_FORMAT: &str = "lpcm";
    pub const YANDEX_SAMPLE_RATE_HERTZ: &str = "48000";
    pub const YANDEX_LANGUAGE: &str = "ru-RU";

    pub const WHISPER_ASR_MODEL: &str = "whisper-1";

    pub const METRICS_BACKEND: &str = "none";
}

/// Provider names used at registration
pub mod provider_names {
    pub const YANDEX: &str = "yandexSpeechKit";
    pub const WHISPER: &str = "whisper";
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub keepalive: Duration,
    /// 0 = one worker per CPU core
    pub workers: usize,
    pub max_file_size: usize,
    pub enable_authorization: bool,
    /// Header set by a trusted gateway carrying a stable owner id.
    /// `None` uses the Bearer credential itself as the owner.
    pub owner_header: Option<String>,
}

/// Background processing settings
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    /// Maximum number of simultaneous ASR calls
    pub max_concurrent_jobs: usize,
    /// Uploads accepted but not yet started
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_grace: Duration,
    /// Bound applied to every provider request
    pub asr_timeout: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: num_cpus::get(),
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
            shutdown_grace: Duration::from_secs(defaults::SHUTDOWN_GRACE_SECONDS),
            asr_timeout: Duration::from_secs(defaults::ASR_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

/// Yandex SpeechKit endpoint and credentials
#[derive(Clone, Debug)]
pub struct YandexAsrConfig {
    pub uri: String,
    pub folder_id: String,
    pub api_key: String,
    pub format: String,
    pub sample_rate_hertz: String,
    pub language: String,
}

/// OpenAI-compatible transcription endpoint
#[derive(Clone, Debug)]
pub struct WhisperAsrConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Metrics collection and export
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// "prometheus" or "none"
    pub exporter_type: String,
}

/// Complete application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub processing: ProcessingConfig,
    pub fingerprint_secret: String,
    /// `None` when no SpeechKit key is configured
    pub yandex: Option<YandexAsrConfig>,
    /// `None` when no transcription URL is configured
    pub whisper: Option<WhisperAsrConfig>,
    pub metrics: MetricsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: IpAddr::from([127, 0, 0, 1]),
                port: defaults::PORT,
                keepalive: Duration::from_secs(defaults::KEEPALIVE_SECONDS),
                workers: defaults::HTTP_WORKER_NUMBER,
                max_file_size: defaults::MAX_FILE_SIZE,
                enable_authorization: defaults::ENABLE_AUTHORIZATION,
                owner_header: None,
            },
            processing: ProcessingConfig::default(),
            fingerprint_secret: defaults::FINGERPRINT_SECRET.to_string(),
            yandex: None,
            whisper: None,
            metrics: MetricsConfig {
                exporter_type: defaults::METRICS_BACKEND.to_string(),
            },
        }
    }
}
