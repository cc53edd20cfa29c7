// Error handling for RecoBattle
//
// This module defines the error type returned by the HTTP handlers and maps it
// onto status codes. Conversions from the library errors live here as well.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::queue_manager::QueueError;
use crate::store::StoreError;

/// Body returned for every internal failure; the detail only goes to the log
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Errors that can occur in the RecoBattle handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The resource is already recorded
    #[error("resource already exists")]
    Conflict,

    /// No provider is registered under the requested name
    #[error("Unknown ASR provider: {0}")]
    UnknownProvider(String),

    /// Error when processing multipart form data
    #[error("Form error: {0}")]
    FormError(String),

    /// A required form field is absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Error when no audio file was provided
    #[error("No audio file provided in the request")]
    NoAudioFile,

    /// Error when a file is too large
    #[error("File too large: exceeds limit of {0} bytes")]
    FileTooLarge(usize),

    #[error("Missing or malformed owner credential")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The processing queue has no free slot
    #[error("Processing queue is full, retry later")]
    QueueFull,

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Create a new FormError
    pub fn form_error<S: Into<String>>(msg: S) -> Self {
        Self::FormError(msg.into())
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::Conflict => StatusCode::CONFLICT,
            HandlerError::UnknownProvider(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HandlerError::FormError(_)
            | HandlerError::MissingField(_)
            | HandlerError::NoAudioFile => StatusCode::BAD_REQUEST,
            HandlerError::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::QueueFull | HandlerError::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            HandlerError::Internal(detail) => {
                error!("Internal error: {}", detail);
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse { error: message })
    }
}

/// Convert StoreError to HandlerError
impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => HandlerError::Conflict,
            StoreError::NotFound(what) => HandlerError::NotFound(what),
            StoreError::Backend(detail) => HandlerError::Internal(detail),
        }
    }
}

/// Convert QueueError to HandlerError
impl From<QueueError> for HandlerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::QueueFull => HandlerError::QueueFull,
            QueueError::ShuttingDown => HandlerError::ShuttingDown,
        }
    }
}
