// Configuration validation module for RecoBattle
//
// This module validates every configuration parameter read from the environment
// and turns the result into an `AppConfig`, collecting all errors and warnings
// so they can be reported together at start-up.
//
// The validation system is schema-driven: `CONFIG_PARAMS` defines type, default,
// range and severity for each option.

use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::{defaults, AppConfig, WhisperAsrConfig, YandexAsrConfig};

/// Configuration parameter types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigType {
    String,
    Integer,
    UnsignedInteger,
    Boolean,
    IpAddress,
    Port,
    Enum(&'static [&'static str]),
}

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must be valid for application to start
    Standard, // Important but application can start with defaults
    Warning,  // Optional, generates warnings only
}

/// Configuration parameter definition
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub name: &'static str,
    pub description: &'static str,
    pub param_type: ConfigType,
    pub default_value: Option<&'static str>,
    pub required: bool,
    pub validation_level: ValidationLevel,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

/// Centralized configuration parameter registry
pub const CONFIG_PARAMS: &[ConfigParam] = &[
    // Server Configuration
    ConfigParam {
        name: "RECOBATTLE_API_HOST",
        description: "Host IP address for the API server",
        param_type: ConfigType::IpAddress,
        default_value: Some(defaults::HOST),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "RECOBATTLE_API_PORT",
        description: "Port for the API server",
        param_type: ConfigType::Port,
        default_value: Some("8080"),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "RECOBATTLE_API_KEEPALIVE",
        description: "HTTP keep-alive in seconds",
        param_type: ConfigType::Integer,
        default_value: Some("75"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "HTTP_WORKER_NUMBER",
        description: "Number of HTTP workers (0 = one per CPU core)",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("0"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(0),
        max_value: Some(256),
    },
    ConfigParam {
        name: "MAX_FILE_SIZE",
        description: "Maximum accepted audio upload in bytes",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("67108864"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1024),
        max_value: None,
    },
    ConfigParam {
        name: "ENABLE_AUTHORIZATION",
        description: "Require a Bearer owner credential on API routes",
        param_type: ConfigType::Boolean,
        default_value: Some("true"),
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "OWNER_HEADER",
        description: "Request header, set by a trusted gateway, holding the owner id",
        param_type: ConfigType::String,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "FINGERPRINT_SECRET",
        description: "Secret keying the audio file fingerprint",
        param_type: ConfigType::String,
        default_value: Some(defaults::FINGERPRINT_SECRET),
        required: true,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    // Processing Configuration
    ConfigParam {
        name: "MAX_CONCURRENT_JOBS",
        description: "Maximum simultaneous ASR calls (defaults to the CPU count)",
        param_type: ConfigType::UnsignedInteger,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(1024),
    },
    ConfigParam {
        name: "JOB_QUEUE_CAPACITY",
        description: "Uploads that may wait for a processing slot",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("100"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(100_000),
    },
    ConfigParam {
        name: "SHUTDOWN_GRACE_SECONDS",
        description: "How long shutdown waits for in-flight jobs",
        param_type: ConfigType::Integer,
        default_value: Some("30"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(0),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "ASR_REQUEST_TIMEOUT_SECONDS",
        description: "Timeout applied to every provider request",
        param_type: ConfigType::Integer,
        default_value: Some("10"),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(600),
    },
    // Yandex SpeechKit
    ConfigParam {
        name: "YANDEX_ASR_URI",
        description: "SpeechKit short audio recognition endpoint",
        param_type: ConfigType::String,
        default_value: Some(defaults::YANDEX_ASR_URI),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "YANDEX_FOLDER_ID",
        description: "Cloud folder identifier sent with every request",
        param_type: ConfigType::String,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "YANDEX_API_KEY",
        description: "SpeechKit API key; the provider is disabled without it",
        param_type: ConfigType::String,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "YANDEX_AUDIO_FORMAT",
        description: "Audio encoding declared to SpeechKit",
        param_type: ConfigType::Enum(&["lpcm", "oggopus"]),
        default_value: Some(defaults::YANDEX_AUDIO_FORMAT),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "YANDEX_SAMPLE_RATE_HERTZ",
        description: "Sample rate declared to SpeechKit for lpcm audio",
        param_type: ConfigType::Enum(&["8000", "16000", "48000"]),
        default_value: Some(defaults::YANDEX_SAMPLE_RATE_HERTZ),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "YANDEX_LANGUAGE",
        description: "Recognition language",
        param_type: ConfigType::String,
        default_value: Some(defaults::YANDEX_LANGUAGE),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    // Whisper-compatible endpoint
    ConfigParam {
        name: "WHISPER_ASR_URL",
        description: "Base URL of an OpenAI-compatible transcription API",
        param_type: ConfigType::String,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_ASR_API_KEY",
        description: "Bearer key for the transcription API",
        param_type: ConfigType::String,
        default_value: None,
        required: false,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "WHISPER_ASR_MODEL",
        description: "Model name sent to the transcription API",
        param_type: ConfigType::String,
        default_value: Some(defaults::WHISPER_ASR_MODEL),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    // Metrics Configuration
    ConfigParam {
        name: "RECOBATTLE_METRICS_BACKEND",
        description: "Metrics backend type",
        param_type: ConfigType::Enum(&["prometheus", "none"]),
        default_value: Some(defaults::METRICS_BACKEND),
        required: false,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
];

/// Configuration validation errors with detailed context
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub error_type: ConfigErrorType,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorType {
    InvalidValue,
    InvalidFormat,
    InvalidRange,
    Required,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error in '{}' ({:?}): {} (value: '{}')",
            self.field, self.error_type, self.message, self.value
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " - Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result type for configuration validation
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Configuration validation results
#[derive(Debug)]
pub struct ValidationResults {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
    pub is_valid: bool,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ConfigValidationError) {
        self.warnings.push(warning);
    }

    pub fn print_summary(&self) {
        if !self.errors.is_empty() {
            error!(
                "Configuration validation found {} error(s):",
                self.errors.len()
            );
            for (i, err) in self.errors.iter().enumerate() {
                error!("  {}. {}", i + 1, err);
            }
        }

        if !self.warnings.is_empty() {
            warn!(
                "Configuration validation found {} warning(s):",
                self.warnings.len()
            );
            for (i, warn) in self.warnings.iter().enumerate() {
                warn!("  {}. {}", i + 1, warn);
            }
        }

        if self.is_valid && self.warnings.is_empty() {
            info!("Configuration validation passed successfully");
        } else if self.is_valid {
            info!(
                "Configuration validation passed with {} warning(s)",
                self.warnings.len()
            );
        }
    }
}

/// Helper functions for common validation patterns
pub mod validators {
    use super::*;

    fn out_of_range(field: &str, value: &str, message: String, suggestion: String) -> ConfigValidationError {
        ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidRange,
            message,
            suggestion: Some(suggestion),
        }
    }

    /// Validate boolean values from string
    pub fn validate_boolean(field: &str, value: &str) -> ValidationResult<bool> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: "Invalid boolean value".to_string(),
                suggestion: Some("Use 'true' or 'false'".to_string()),
            }),
        }
    }

    /// Validate integer values with optional range
    pub fn validate_integer(
        field: &str,
        value: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> ValidationResult<i64> {
        let parsed = value.parse::<i64>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid integer format".to_string(),
            suggestion: Some("Use a valid integer number".to_string()),
        })?;

        if let Some(min) = min {
            if parsed < min {
                return Err(out_of_range(
                    field,
                    value,
                    format!("Value {} is below minimum {}", parsed, min),
                    format!("Use a value >= {}", min),
                ));
            }
        }

        if let Some(max) = max {
            if parsed > max {
                return Err(out_of_range(
                    field,
                    value,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate unsigned integer values with optional range
    pub fn validate_usize(
        field: &str,
        value: &str,
        min: Option<i64>,
        max: Option<i64>,
    ) -> ValidationResult<usize> {
        let parsed = value.parse::<usize>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid unsigned integer format".to_string(),
            suggestion: Some("Use a valid positive integer number".to_string()),
        })?;

        if let Some(min) = min {
            if (parsed as i64) < min {
                return Err(out_of_range(
                    field,
                    value,
                    format!("Value {} is below minimum {}", parsed, min),
                    format!("Use a value >= {}", min),
                ));
            }
        }

        if let Some(max) = max {
            if (parsed as i64) > max {
                return Err(out_of_range(
                    field,
                    value,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate enumerated values
    pub fn validate_enum(
        field: &str,
        value: &str,
        valid_values: &[&str],
        case_sensitive: bool,
    ) -> ValidationResult<String> {
        let matches = valid_values.iter().any(|v| {
            if case_sensitive {
                *v == value
            } else {
                v.eq_ignore_ascii_case(value)
            }
        });

        if matches {
            Ok(value.to_lowercase())
        } else {
            Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: format!("Invalid value, must be one of: {}", valid_values.join(", ")),
                suggestion: Some(format!("Use one of: {}", valid_values.join(", "))),
            })
        }
    }

    /// Validate IP address
    pub fn validate_ip_address(field: &str, value: &str) -> ValidationResult<IpAddr> {
        IpAddr::from_str(value).map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid IP address format".to_string(),
            suggestion: Some(
                "Use a valid IPv4 or IPv6 address (e.g., 127.0.0.1 or ::1)".to_string(),
            ),
        })
    }

    /// Validate port number
    pub fn validate_port(field: &str, value: &str) -> ValidationResult<u16> {
        let port = value.parse::<u16>().map_err(|_| ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            error_type: ConfigErrorType::InvalidFormat,
            message: "Invalid port number format".to_string(),
            suggestion: Some("Use a number between 1 and 65535".to_string()),
        })?;

        if port == 0 {
            return Err(out_of_range(
                field,
                value,
                "Port number cannot be 0".to_string(),
                "Use a port between 1 and 65535".to_string(),
            ));
        }

        Ok(port)
    }

    /// Validate an absolute http(s) URL
    /// Validate an HTTP header name, returned lowercased
    pub fn validate_header_name(field: &str, value: &str) -> ValidationResult<String> {
        let name = value.trim().to_ascii_lowercase();
        let is_token = |c: char| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c);
        if !name.is_empty() && name.chars().all(is_token) {
            Ok(name)
        } else {
            Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidFormat,
                message: "Not a valid HTTP header name".to_string(),
                suggestion: Some("Use a header name such as X-User-Id".to_string()),
            })
        }
    }

    pub fn validate_http_url(field: &str, value: &str) -> ValidationResult<String> {
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(value.to_string())
        } else {
            Err(ConfigValidationError {
                field: field.to_string(),
                value: value.to_string(),
                error_type: ConfigErrorType::InvalidFormat,
                message: "URL must use the http or https scheme".to_string(),
                suggestion: Some("Use a full URL such as https://host/path".to_string()),
            })
        }
    }
}

/// Helper function to get optional environment variable
pub fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Provider settings collected before deciding which providers are enabled
#[derive(Debug, Default)]
struct ProviderSettings {
    yandex_uri: String,
    yandex_folder_id: Option<String>,
    yandex_api_key: Option<String>,
    yandex_format: String,
    yandex_sample_rate: String,
    yandex_language: String,
    whisper_url: Option<String>,
    whisper_api_key: Option<String>,
    whisper_model: String,
}

/// Configuration validator for RecoBattle
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate all configuration parameters from the process environment
    pub fn validate_and_load() -> Result<AppConfig, ValidationResults> {
        Self::validate_from(get_env_optional)
    }

    /// Validate all configuration parameters, reading raw values through `lookup`
    pub fn validate_from<F>(lookup: F) -> Result<AppConfig, ValidationResults>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut results = ValidationResults::new();
        let mut config = AppConfig::default();
        let mut providers = ProviderSettings::default();

        info!("Starting configuration validation...");

        for param in CONFIG_PARAMS {
            let value = lookup(param.name)
                .or_else(|| param.default_value.map(String::from))
                .unwrap_or_default();

            if param.required && value.is_empty() {
                let error = ConfigValidationError {
                    field: param.name.to_string(),
                    value: "".to_string(),
                    error_type: ConfigErrorType::Required,
                    message: "Required parameter is missing".to_string(),
                    suggestion: Some(format!("Set {} environment variable", param.name)),
                };
                Self::report(&mut results, param, error);
                continue;
            }

            if value.is_empty() {
                continue;
            }

            if let Err(error) =
                Self::validate_and_store_parameter(param, &value, &mut config, &mut providers)
            {
                Self::report(&mut results, param, error);
            }
        }

        Self::resolve_providers(&mut results, &mut config, providers);
        Self::validate_cross_dependencies(&mut results, &config);

        results.print_summary();

        if results.is_valid {
            Ok(config)
        } else {
            Err(results)
        }
    }

    fn report(results: &mut ValidationResults, param: &ConfigParam, error: ConfigValidationError) {
        match param.validation_level {
            ValidationLevel::Critical | ValidationLevel::Standard => results.add_error(error),
            ValidationLevel::Warning => results.add_warning(error),
        }
    }

    /// Validate a single parameter and store its value in the config struct
    fn validate_and_store_parameter(
        param: &ConfigParam,
        value: &str,
        config: &mut AppConfig,
        providers: &mut ProviderSettings,
    ) -> ValidationResult<()> {
        match param.param_type {
            ConfigType::String => match param.name {
                "FINGERPRINT_SECRET" => config.fingerprint_secret = value.to_string(),
                "OWNER_HEADER" => {
                    config.server.owner_header =
                        Some(validators::validate_header_name(param.name, value)?)
                }
                "YANDEX_ASR_URI" => {
                    providers.yandex_uri = validators::validate_http_url(param.name, value)?
                }
                "YANDEX_FOLDER_ID" => providers.yandex_folder_id = Some(value.to_string()),
                "YANDEX_API_KEY" => providers.yandex_api_key = Some(value.to_string()),
                "YANDEX_LANGUAGE" => providers.yandex_language = value.to_string(),
                "WHISPER_ASR_URL" => {
                    providers.whisper_url = Some(validators::validate_http_url(param.name, value)?)
                }
                "WHISPER_ASR_API_KEY" => providers.whisper_api_key = Some(value.to_string()),
                "WHISPER_ASR_MODEL" => providers.whisper_model = value.to_string(),
                _ => {}
            },
            ConfigType::Integer => {
                let parsed = validators::validate_integer(
                    param.name,
                    value,
                    param.min_value,
                    param.max_value,
                )?;
                // ranges above guarantee non-negative values
                let seconds = Duration::from_secs(parsed.max(0) as u64);
                match param.name {
                    "RECOBATTLE_API_KEEPALIVE" => config.server.keepalive = seconds,
                    "SHUTDOWN_GRACE_SECONDS" => config.processing.shutdown_grace = seconds,
                    "ASR_REQUEST_TIMEOUT_SECONDS" => config.processing.asr_timeout = seconds,
                    _ => {}
                }
            }
            ConfigType::UnsignedInteger => {
                let parsed = validators::validate_usize(
                    param.name,
                    value,
                    param.min_value,
                    param.max_value,
                )?;
                match param.name {
                    "HTTP_WORKER_NUMBER" => config.server.workers = parsed,
                    "MAX_FILE_SIZE" => config.server.max_file_size = parsed,
                    "MAX_CONCURRENT_JOBS" => config.processing.max_concurrent_jobs = parsed,
                    "JOB_QUEUE_CAPACITY" => config.processing.queue_capacity = parsed,
                    _ => {}
                }
            }
            ConfigType::Boolean => {
                let parsed = validators::validate_boolean(param.name, value)?;
                if param.name == "ENABLE_AUTHORIZATION" {
                    config.server.enable_authorization = parsed;
                }
            }
            ConfigType::IpAddress => {
                let parsed = validators::validate_ip_address(param.name, value)?;
                if param.name == "RECOBATTLE_API_HOST" {
                    config.server.host = parsed;
                }
            }
            ConfigType::Port => {
                let parsed = validators::validate_port(param.name, value)?;
                if param.name == "RECOBATTLE_API_PORT" {
                    config.server.port = parsed;
                }
            }
            ConfigType::Enum(valid_values) => {
                let parsed = validators::validate_enum(param.name, value, valid_values, false)?;
                match param.name {
                    "YANDEX_AUDIO_FORMAT" => providers.yandex_format = parsed,
                    "YANDEX_SAMPLE_RATE_HERTZ" => providers.yandex_sample_rate = parsed,
                    "RECOBATTLE_METRICS_BACKEND" => config.metrics.exporter_type = parsed,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Enable each provider whose credentials or endpoint are present
    fn resolve_providers(
        results: &mut ValidationResults,
        config: &mut AppConfig,
        providers: ProviderSettings,
    ) {
        match (providers.yandex_api_key, providers.yandex_folder_id) {
            (Some(api_key), Some(folder_id)) => {
                config.yandex = Some(YandexAsrConfig {
                    uri: providers.yandex_uri,
                    folder_id,
                    api_key,
                    format: providers.yandex_format,
                    sample_rate_hertz: providers.yandex_sample_rate,
                    language: providers.yandex_language,
                });
            }
            (Some(_), None) => {
                results.add_error(ConfigValidationError {
                    field: "YANDEX_FOLDER_ID".to_string(),
                    value: "".to_string(),
                    error_type: ConfigErrorType::Required,
                    message: "Folder id required when YANDEX_API_KEY is set".to_string(),
                    suggestion: Some("Set YANDEX_FOLDER_ID or remove YANDEX_API_KEY".to_string()),
                });
            }
            (None, Some(folder_id)) => {
                results.add_warning(ConfigValidationError {
                    field: "YANDEX_API_KEY".to_string(),
                    value: "".to_string(),
                    error_type: ConfigErrorType::Required,
                    message: format!(
                        "YANDEX_FOLDER_ID is set to '{}' but no API key is configured, SpeechKit stays disabled",
                        folder_id
                    ),
                    suggestion: Some("Set YANDEX_API_KEY to enable SpeechKit".to_string()),
                });
            }
            (None, None) => {}
        }

        if let Some(url) = providers.whisper_url {
            config.whisper = Some(WhisperAsrConfig {
                url,
                api_key: providers.whisper_api_key,
                model: providers.whisper_model,
            });
        }
    }

    /// Validate cross-parameter dependencies
    fn validate_cross_dependencies(results: &mut ValidationResults, config: &AppConfig) {
        if config.fingerprint_secret == defaults::FINGERPRINT_SECRET {
            results.add_warning(ConfigValidationError {
                field: "FINGERPRINT_SECRET".to_string(),
                value: "<default>".to_string(),
                error_type: ConfigErrorType::InvalidValue,
                message: "Fingerprint secret is left at its built-in default".to_string(),
                suggestion: Some("Set FINGERPRINT_SECRET to a private value".to_string()),
            });
        }

        if config.yandex.is_none() && config.whisper.is_none() {
            results.add_warning(ConfigValidationError {
                field: "YANDEX_API_KEY".to_string(),
                value: "".to_string(),
                error_type: ConfigErrorType::Required,
                message: "No ASR provider is configured, every upload will be rejected".to_string(),
                suggestion: Some(
                    "Set YANDEX_API_KEY and YANDEX_FOLDER_ID, or WHISPER_ASR_URL".to_string(),
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ValidationResults> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigValidator::validate_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.port, defaults::PORT);
        assert_eq!(config.server.max_file_size, defaults::MAX_FILE_SIZE);
        assert!(config.server.enable_authorization);
        assert_eq!(config.processing.queue_capacity, defaults::JOB_QUEUE_CAPACITY);
        assert_eq!(config.processing.asr_timeout, Duration::from_secs(10));
        assert!(config.processing.max_concurrent_jobs >= 1);
        assert!(config.yandex.is_none());
        assert!(config.whisper.is_none());
        assert_eq!(config.metrics.exporter_type, "none");
    }

    #[test]
    fn test_values_are_applied() {
        let config = load(&[
            ("RECOBATTLE_API_HOST", "0.0.0.0"),
            ("RECOBATTLE_API_PORT", "9000"),
            ("ENABLE_AUTHORIZATION", "off"),
            ("MAX_CONCURRENT_JOBS", "3"),
            ("SHUTDOWN_GRACE_SECONDS", "5"),
            ("RECOBATTLE_METRICS_BACKEND", "Prometheus"),
        ])
        .unwrap();
        assert_eq!(config.server.host, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(config.server.port, 9000);
        assert!(!config.server.enable_authorization);
        assert_eq!(config.processing.max_concurrent_jobs, 3);
        assert_eq!(config.processing.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.metrics.exporter_type, "prometheus");
        assert_eq!(config.server.owner_header, None);
    }

    #[test]
    fn test_owner_header() {
        let config = load(&[("OWNER_HEADER", "X-User-Id")]).unwrap();
        assert_eq!(config.server.owner_header.as_deref(), Some("x-user-id"));

        let results = load(&[("OWNER_HEADER", "X User")]).unwrap_err();
        assert_eq!(results.errors[0].field, "OWNER_HEADER");
        assert_eq!(results.errors[0].error_type, ConfigErrorType::InvalidFormat);
    }

    #[test]
    fn test_invalid_values_are_collected() {
        let results = load(&[
            ("RECOBATTLE_API_PORT", "0"),
            ("ENABLE_AUTHORIZATION", "maybe"),
            ("JOB_QUEUE_CAPACITY", "0"),
        ])
        .unwrap_err();
        assert!(!results.is_valid);
        assert_eq!(results.errors.len(), 3);
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let results = load(&[("FINGERPRINT_SECRET", "")]).unwrap_err();
        assert_eq!(results.errors[0].field, "FINGERPRINT_SECRET");
        assert_eq!(results.errors[0].error_type, ConfigErrorType::Required);
    }

    #[test]
    fn test_default_secret_warns() {
        let results = ConfigValidator::validate_from(|_| None);
        assert!(results.is_ok());

        let mut checked = ValidationResults::new();
        ConfigValidator::validate_cross_dependencies(&mut checked, &AppConfig::default());
        assert!(checked.is_valid);
        assert!(checked
            .warnings
            .iter()
            .any(|w| w.field == "FINGERPRINT_SECRET"));
    }

    #[test]
    fn test_yandex_enabled_with_key_and_folder() {
        let config = load(&[
            ("YANDEX_API_KEY", "key"),
            ("YANDEX_FOLDER_ID", "folder"),
            ("YANDEX_SAMPLE_RATE_HERTZ", "16000"),
        ])
        .unwrap();
        let yandex = config.yandex.unwrap();
        assert_eq!(yandex.api_key, "key");
        assert_eq!(yandex.folder_id, "folder");
        assert_eq!(yandex.uri, defaults::YANDEX_ASR_URI);
        assert_eq!(yandex.format, "lpcm");
        assert_eq!(yandex.sample_rate_hertz, "16000");
        assert_eq!(yandex.language, "ru-RU");
    }

    #[test]
    fn test_yandex_key_without_folder_is_error() {
        let results = load(&[("YANDEX_API_KEY", "key")]).unwrap_err();
        assert!(results.errors.iter().any(|e| e.field == "YANDEX_FOLDER_ID"));
    }

    #[test]
    fn test_whisper_enabled_by_url() {
        let config = load(&[("WHISPER_ASR_URL", "http://localhost:9000/v1")]).unwrap();
        let whisper = config.whisper.unwrap();
        assert_eq!(whisper.url, "http://localhost:9000/v1");
        assert_eq!(whisper.api_key, None);
        assert_eq!(whisper.model, "whisper-1");

        let results = load(&[("WHISPER_ASR_URL", "localhost:9000")]).unwrap_err();
        assert!(results.errors.iter().any(|e| e.field == "WHISPER_ASR_URL"));
    }

    #[test]
    fn test_validators() {
        assert!(validators::validate_boolean("F", "yes").unwrap());
        assert!(validators::validate_integer("F", "5", Some(10), None).is_err());
        assert!(validators::validate_usize("F", "-1", None, None).is_err());
        assert_eq!(
            validators::validate_enum("F", "OGGOPUS", &["lpcm", "oggopus"], false).unwrap(),
            "oggopus"
        );
        assert!(validators::validate_enum("F", "OGGOPUS", &["lpcm", "oggopus"], true).is_err());
        assert!(validators::validate_ip_address("F", "not-an-ip").is_err());
    }
}
